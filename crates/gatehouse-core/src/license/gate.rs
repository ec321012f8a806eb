//! The admission gate: the only HTTP-facing, mutating license operation.
//!
//! An axum middleware that extracts the license key, HWID, and resolved
//! client IP, runs the validator, and either commits one admission and
//! forwards the request with the license context attached, or rejects with
//! 403. Every failure after extraction — policy or infrastructure — takes
//! the same 403 path, so callers cannot probe which layer rejected them.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app::App;
use crate::extract::{ClientIp, resolve_client_ip};
use crate::license::validator::CheckError;
use crate::prelude::*;

/// Read a header as a string, treating missing and non-UTF8 alike.
fn header_str(req: &Request<Body>, name: &str) -> Option<String> {
	req.headers().get(name).and_then(|h| h.to_str().ok()).map(str::to_owned)
}

fn denied(err: &CheckError) -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(serde_json::json!({
			"error": "Access denied",
			"reason": err.reason(),
			"code": err.code(),
		})),
	)
		.into_response()
}

pub async fn license_gate(State(app): State<App>, mut req: Request<Body>, next: Next) -> Response {
	let license_key = header_str(&req, "x-license-key");
	let hwid = header_str(&req, "x-hwid");
	let client_ip = resolve_client_ip(&req, app.config.trusted_proxy_hops);

	let license = match app
		.validator
		.check_license(license_key.as_deref(), client_ip, hwid.as_deref())
		.await
	{
		Ok(license) => license,
		Err(err) => {
			if let CheckError::Store(store_err) = &err {
				error!(
					ip = ?client_ip,
					"License check infrastructure failure: {}", store_err
				);
			} else {
				debug!(ip = ?client_ip, code = err.code(), "Admission denied");
			}
			app.validator.record_failed_attempt(client_ip).await;
			return denied(&err);
		}
	};

	match app.validator.commit_use(&license, client_ip, hwid.as_deref()).await {
		Ok(ctx) => {
			req.extensions_mut().insert(ctx);
			if let Some(ip) = client_ip {
				req.extensions_mut().insert(ClientIp(ip));
			}
			next.run(req).await
		}
		Err(err) => {
			// Same opaque denial as a policy rejection
			error!(license = %license.key, "Failed to record license use: {}", err);
			denied(&CheckError::Store(err))
		}
	}
}

// vim: ts=4
