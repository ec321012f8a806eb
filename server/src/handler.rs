use axum::Json;

use gatehouse_core::app::VERSION;
use gatehouse_core::extract::{ClientIp, LicenseCtx};

pub async fn get_status() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

/// Demonstration endpoint behind the full admission chain: echoes what the
/// gate attached.
pub async fn get_ping(license: LicenseCtx, ClientIp(ip): ClientIp) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"pong": true,
		"tier": license.typ,
		"ip": ip.to_string(),
	}))
}

// vim: ts=4
