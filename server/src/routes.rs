use axum::{Router, middleware, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use gatehouse_core::license::gate::license_gate;
use gatehouse_core::rate_limit::RateLimitLayer;

use crate::admin::{self, AdminState};
use crate::handler;
use crate::prelude::*;
use crate::settings::ServerConfig;

pub fn init(app: App, config: &ServerConfig) -> Router {
	// Business routes sit behind the full admission chain: the license
	// gate judges and commits first, then the tier limiter throttles
	let protected = Router::new()
		.route("/api/ping", get(handler::get_ping))
		.layer(RateLimitLayer::tiered(app.clone()))
		.layer(middleware::from_fn_with_state(app.clone(), license_gate));

	// Health endpoint: no license, conservative default limiter only
	let public = Router::new()
		.route("/api/status", get(handler::get_status))
		.layer(RateLimitLayer::custom(
			app.clone(),
			app.config.default_limit.clone(),
		));

	let mut router = Router::new().merge(public).merge(protected);

	match &config.admin_token {
		Some(token) => {
			let admin_state = AdminState { app: app.clone(), token: token.clone() };
			router = router.merge(admin::init(admin_state));
		}
		None => warn!("No admin token configured, admin endpoints disabled"),
	}

	router.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}

// vim: ts=4
