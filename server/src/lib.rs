//! Gatehouse is a multi-tenant API admission-control service.
//!
//! Every request is judged before any business logic runs:
//!	- source-IP blocklisting (with time-bounded bans and an auto-unblock
//!	  sweep)
//!	- license validation (key, HWID binding, expiry, usage quota)
//!	- tier-based rate limiting (FREE/BASIC/PREMIUM caps per source IP)
//!
//! The admission components live in `gatehouse-core`; persistence and
//! alerting are adapters behind traits. This crate wires them together,
//! loads configuration, and serves the HTTP surface.

#![forbid(unsafe_code)]

pub mod admin;
pub mod bootstrap;
pub mod handler;
pub mod prelude;
pub mod routes;
pub mod settings;

use crate::prelude::*;

/// Load configuration and run the server until shutdown.
pub async fn run() -> GhResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = settings::load()?;
	bootstrap::run(config).await
}

// vim: ts=4
