//! Client identity extraction: resolved source IP and license context.
//!
//! The forwarded-address chain is only consulted under an explicit
//! trusted-proxy-hop count; nothing in a request header is believed unless
//! configuration says a trusted proxy put it there.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use hyper::Request;

use gatehouse_types::store_adapter::LicenseType;

use crate::prelude::*;

/// Resolve the "real" client IP of a request.
///
/// With `trusted_proxy_hops == 0` the socket peer address is the client.
/// With N hops, the peer is hop 1 and the `x-forwarded-for` chain supplies
/// the rest: the resolver walks the chain from the right past the remaining
/// N-1 trusted entries and takes the next one, clamping to the leftmost
/// entry when the chain is shorter than the trust depth.
pub fn resolve_client_ip<B>(req: &Request<B>, trusted_proxy_hops: usize) -> Option<IpAddr> {
	let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());

	if trusted_proxy_hops == 0 {
		return peer;
	}

	let forwarded: Vec<IpAddr> = req
		.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.map(|s| s.split(',').filter_map(|ip| ip.trim().parse().ok()).collect())
		.unwrap_or_default();

	if forwarded.is_empty() {
		return peer;
	}

	// Peer is hop 1, so hops-1 entries at the right end of the chain are
	// trusted proxies; clamp to the leftmost entry on short chains.
	let idx = forwarded.len().saturating_sub(trusted_proxy_hops);
	forwarded.get(idx).copied().or(peer)
}

// ClientIp //
//**********//
/// The resolved source address, attached to request extensions by the gate.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<ClientIp>().copied().ok_or(Error::PermissionDenied)
	}
}

// LicenseCtx //
//************//
/// Normalized license context attached to request extensions by the gate.
#[derive(Clone, Debug)]
pub struct LicenseCtx {
	pub key: Box<str>,
	pub typ: LicenseType,
}

impl<S> FromRequestParts<S> for LicenseCtx
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts.extensions.get::<LicenseCtx>().cloned().ok_or(Error::PermissionDenied)
	}
}

// OptionalLicense //
//*****************//
/// License context extractor that doesn't fail on untiered routes
#[derive(Clone, Debug)]
pub struct OptionalLicense(pub Option<LicenseCtx>);

impl<S> FromRequestParts<S> for OptionalLicense
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(OptionalLicense(parts.extensions.get::<LicenseCtx>().cloned()))
	}
}


// vim: ts=4
