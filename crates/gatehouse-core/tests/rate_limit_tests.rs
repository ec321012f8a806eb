//! Rate limit middleware behavior: window caps, violation recording,
//! blocklist short-circuit, tier selection, and alert policy.

mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use common::*;
use gatehouse_core::app::App;
use gatehouse_core::config::AdmissionConfig;
use gatehouse_core::license::gate::license_gate;
use gatehouse_core::rate_limit::{LimiterConfig, RateLimitLayer};
use gatehouse_types::store_adapter::{LicenseType, StoreAdapter};
use gatehouse_types::types::now;

async fn ping() -> &'static str {
	"pong"
}

fn router_with_custom_limit(app: &App, cfg: LimiterConfig) -> Router {
	Router::new()
		.route("/api/ping", get(ping))
		.layer(RateLimitLayer::custom(app.clone(), cfg))
}

fn router_with_tiered_limit(app: &App) -> Router {
	Router::new()
		.route("/api/ping", get(ping))
		.layer(RateLimitLayer::tiered(app.clone()))
		.layer(middleware::from_fn_with_state(app.clone(), license_gate))
}

#[tokio::test]
async fn test_custom_limiter_caps_requests_and_records_one_violation() {
	let (app, store, _sink) = build_app(test_config());
	let router = router_with_custom_limit(&app, LimiterConfig::new(1_000, 1));

	let response = router
		.clone()
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

	let violations = store.violation_rows();
	assert_eq!(violations.len(), 1);
	assert_eq!(violations[0].ip_address.as_ref(), "1.2.3.4");
	assert_eq!(violations[0].path.as_ref(), "/api/ping");
}

#[tokio::test]
async fn test_custom_limiter_message_in_429_body() {
	let (app, _store, _sink) = build_app(test_config());
	let cfg = LimiterConfig::new(1_000, 1).with_message("Easy there");
	let router = router_with_custom_limit(&app, cfg);

	router
		.clone()
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();

	let body = body_json(response).await;
	assert_eq!(body["message"], "Easy there");
}

#[tokio::test]
async fn test_limits_are_tracked_per_ip() {
	let (app, _store, _sink) = build_app(test_config());
	let router = router_with_custom_limit(&app, LimiterConfig::new(1_000, 1));

	for peer in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
		let response = router
			.clone()
			.oneshot(request("/api/ping", peer, None, None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
}

#[tokio::test]
async fn test_blocked_ip_short_circuits_without_violation() {
	let (app, store, _sink) = build_app(test_config());
	store.seed_block("1.2.3.4", true, None);
	let router = router_with_custom_limit(&app, LimiterConfig::new(1_000, 1));

	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let body = body_json(response).await;
	assert_eq!(body, serde_json::json!({ "error": "Access denied" }));
	assert!(store.violation_rows().is_empty());
}

#[tokio::test]
async fn test_blocklist_storage_failure_propagates() {
	let (app, store, _sink) = build_app(test_config());
	store.fail_all.store(true, Ordering::SeqCst);
	let router = router_with_custom_limit(&app, LimiterConfig::new(1_000, 1));

	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();

	// Never silently treated as "not blocked"
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_tier_selection_uses_the_license_context() {
	let config = AdmissionConfig {
		free_limit: LimiterConfig::new(60_000, 1),
		premium_limit: LimiterConfig::new(60_000, 100),
		..test_config()
	};
	let (app, store, _sink) = build_app(config);
	store.seed_license(license_fixture("free-key", LicenseType::Free));
	store.seed_license(license_fixture("premium-key", LicenseType::Premium));
	let router = router_with_tiered_limit(&app);

	// Free tier: second request in the window is throttled
	let response = router
		.clone()
		.oneshot(request("/api/ping", "1.1.1.1", Some("free-key"), None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let response = router
		.clone()
		.oneshot(request("/api/ping", "1.1.1.1", Some("free-key"), None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

	// Premium tier from another address keeps flowing
	for _ in 0..5 {
		let response = router
			.clone()
			.oneshot(request("/api/ping", "2.2.2.2", Some("premium-key"), None))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
}

#[tokio::test]
async fn test_absent_license_gets_the_default_limiter() {
	let config = AdmissionConfig {
		default_limit: LimiterConfig::new(60_000, 1),
		..test_config()
	};
	let (app, _store, _sink) = build_app(config);
	// No gate in front: nothing attaches a license context
	let router = Router::new()
		.route("/api/ping", get(ping))
		.layer(RateLimitLayer::tiered(app.clone()));

	let response = router
		.clone()
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_violation_count_alerts_once_per_qualifying_call() {
	let (app, store, sink) = build_app(test_config());
	let ip: IpAddr = "1.2.3.4".parse().unwrap();
	for _ in 0..3 {
		store.append_violation("1.2.3.4", "/api/ping", now()).await.unwrap();
	}

	assert_eq!(app.rate_limiter.violation_count(&ip).await, 3);
	wait_for_alerts(&sink, 1).await;
	assert_eq!(sink.count_titled("Critical Rate Limit Violations"), 1);

	// Interval 0: every qualifying call alerts again
	assert_eq!(app.rate_limiter.violation_count(&ip).await, 3);
	wait_for_alerts(&sink, 2).await;
	assert_eq!(sink.count_titled("Critical Rate Limit Violations"), 2);
}

#[tokio::test]
async fn test_alert_policy_suppresses_within_interval() {
	let config = AdmissionConfig { alert_interval_secs: 300, ..test_config() };
	let (app, store, sink) = build_app(config);
	let ip: IpAddr = "1.2.3.4".parse().unwrap();
	for _ in 0..3 {
		store.append_violation("1.2.3.4", "/api/ping", now()).await.unwrap();
	}

	app.rate_limiter.violation_count(&ip).await;
	app.rate_limiter.violation_count(&ip).await;
	settle().await;

	assert_eq!(sink.count_titled("Critical Rate Limit Violations"), 1);
}

#[tokio::test]
async fn test_below_threshold_does_not_alert() {
	let (app, store, sink) = build_app(test_config());
	let ip: IpAddr = "1.2.3.4".parse().unwrap();
	for _ in 0..2 {
		store.append_violation("1.2.3.4", "/api/ping", now()).await.unwrap();
	}

	assert_eq!(app.rate_limiter.violation_count(&ip).await, 2);
	settle().await;
	assert_eq!(sink.count_titled("Critical Rate Limit Violations"), 0);
}

#[tokio::test]
async fn test_violation_count_storage_failure_yields_zero() {
	let (app, store, _sink) = build_app(test_config());
	let ip: IpAddr = "1.2.3.4".parse().unwrap();
	store.fail_violations.store(true, Ordering::SeqCst);

	assert_eq!(app.rate_limiter.violation_count(&ip).await, 0);
}

#[tokio::test]
async fn test_violation_store_failure_does_not_undo_the_429() {
	let (app, store, _sink) = build_app(test_config());
	store.fail_violations.store(true, Ordering::SeqCst);
	let router = router_with_custom_limit(&app, LimiterConfig::new(1_000, 1));

	router
		.clone()
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();
	let response = router
		.oneshot(request("/api/ping", "1.2.3.4", None, None))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
	assert!(store.violation_rows().is_empty());
}

#[tokio::test]
async fn test_repeated_violations_escalate_to_a_block() {
	let config = AdmissionConfig {
		escalate_violations: 3,
		..test_config()
	};
	let (app, store, _sink) = build_app(config);
	let router = router_with_custom_limit(&app, LimiterConfig::new(60_000, 1));

	// First request passes, the rest violate until escalation blocks the IP
	for _ in 0..4 {
		router
			.clone()
			.oneshot(request("/api/ping", "6.6.6.6", None, None))
			.await
			.unwrap();
	}

	let block = store.active_block("6.6.6.6").unwrap();
	assert_eq!(block.reason.as_ref(), "Repeated rate limit violations");

	// Once blocked, the short-circuit answers before the limiter
	let response = router
		.oneshot(request("/api/ping", "6.6.6.6", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let body = body_json(response).await;
	assert_eq!(body, serde_json::json!({ "error": "Access denied" }));
}

// vim: ts=4
