//! Operator endpoints for explicit IP block management.
//!
//! Mounted only when an admin token is configured; every request must
//! carry it as a bearer token.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::time::Duration;

use gatehouse_types::store_adapter::BlockedIp;

use crate::prelude::*;

#[derive(Clone)]
pub struct AdminState {
	pub app: App,
	pub token: Box<str>,
}

pub fn init(state: AdminState) -> Router {
	Router::new()
		.route("/api/admin/blocks", get(list_blocks).post(post_block))
		.route("/api/admin/blocks/{ip}", axum::routing::delete(delete_block))
		.layer(middleware::from_fn_with_state(state.clone(), require_admin))
		.with_state(state)
}

async fn require_admin(
	State(state): State<AdminState>,
	req: Request<Body>,
	next: Next,
) -> GhResult<Response> {
	let auth_header = req
		.headers()
		.get("Authorization")
		.and_then(|h| h.to_str().ok())
		.ok_or(Error::PermissionDenied)?;

	if !auth_header.starts_with("Bearer ") {
		return Err(Error::PermissionDenied);
	}

	let token = auth_header[7..].trim();
	if token != state.token.as_ref() {
		return Err(Error::PermissionDenied);
	}

	Ok(next.run(req).await)
}

#[derive(Debug, Deserialize)]
pub struct ListBlocksQuery {
	#[serde(default)]
	active: bool,
}

async fn list_blocks(
	State(state): State<AdminState>,
	Query(query): Query<ListBlocksQuery>,
) -> GhResult<Json<Vec<BlockedIp>>> {
	let blocks = state.app.blocklist.list(query.active).await?;
	Ok(Json(blocks))
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
	pub ip: Box<str>,
	pub reason: Option<Box<str>>,
	#[serde(rename = "ttlSecs")]
	pub ttl_secs: Option<u64>,
}

async fn post_block(
	State(state): State<AdminState>,
	Json(body): Json<BlockRequest>,
) -> GhResult<Json<serde_json::Value>> {
	if body.ip.parse::<std::net::IpAddr>().is_err() {
		return Err(Error::ValidationError(format!("invalid ip address: {}", body.ip)));
	}

	let reason = body.reason.as_deref().unwrap_or("Blocked by operator");
	let ttl = body.ttl_secs.map(Duration::from_secs);
	state.app.blocklist.block(&body.ip, reason, ttl).await?;

	Ok(Json(serde_json::json!({ "blocked": body.ip })))
}

async fn delete_block(
	State(state): State<AdminState>,
	Path(ip): Path<String>,
) -> GhResult<Json<serde_json::Value>> {
	state.app.blocklist.unblock(&ip).await?;
	Ok(Json(serde_json::json!({ "unblocked": ip })))
}

// vim: ts=4
