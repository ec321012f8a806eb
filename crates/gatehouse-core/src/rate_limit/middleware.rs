//! Rate Limiting Middleware
//!
//! Tower middleware layer applying the blocklist short-circuit and the
//! tier-selected (or route-bound custom) limiter to axum routes. Blocked
//! sources are rejected before any limiter state is touched and without
//! recording a violation.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::app::App;
use crate::extract::{LicenseCtx, resolve_client_ip};
use crate::prelude::*;
use crate::rate_limit::limiter::{LimiterConfig, TierLimiter};

/// Rate limit middleware layer
#[derive(Clone)]
pub struct RateLimitLayer {
	app: App,
	/// Route-bound limiter; `None` selects by license tier
	limiter: Option<Arc<TierLimiter>>,
}

impl RateLimitLayer {
	/// Layer that selects a limiter from the license context attached by
	/// the gate, falling back to the default limiter.
	pub fn tiered(app: App) -> Self {
		Self { app, limiter: None }
	}

	/// Layer bound to one custom limiter config, independent of license
	/// tier.
	pub fn custom(app: App, cfg: LimiterConfig) -> Self {
		let limiter = app.rate_limiter.custom_limiter(cfg);
		Self { app, limiter: Some(limiter) }
	}
}

impl<S> Layer<S> for RateLimitLayer {
	type Service = RateLimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RateLimitService { inner, app: self.app.clone(), limiter: self.limiter.clone() }
	}
}

/// Rate limit middleware service
#[derive(Clone)]
pub struct RateLimitService<S> {
	inner: S,
	app: App,
	limiter: Option<Arc<TierLimiter>>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
	S: Service<Request<Body>, Response = axum::response::Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let app = self.app.clone();
		let bound_limiter = self.limiter.clone();
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let Some(ip) = resolve_client_ip(&req, app.config.trusted_proxy_hops) else {
				// No resolvable source address, nothing to key on
				return inner.call(req).await;
			};

			// Blocked sources short-circuit throttling entirely: no
			// limiter consulted, no violation recorded
			match app.blocklist.is_blocked(&ip.to_string()).await {
				Ok(true) => {
					return Ok((
						StatusCode::FORBIDDEN,
						Json(serde_json::json!({ "error": "Access denied" })),
					)
						.into_response());
				}
				Ok(false) => {}
				Err(err) => {
					error!(ip = %ip, "Blocklist check failed in rate limiter: {}", err);
					return Ok(err.into_response());
				}
			}

			let limiter = bound_limiter.unwrap_or_else(|| {
				let typ = req.extensions().get::<LicenseCtx>().map(|license| license.typ);
				app.rate_limiter.limiter_for(typ)
			});

			if limiter.check(&ip).is_err() {
				// Violation is recorded before the response goes out
				app.rate_limiter.record_violation(&ip, req.uri().path()).await;
				return Ok((
					StatusCode::TOO_MANY_REQUESTS,
					Json(serde_json::json!({ "message": limiter.message() })),
				)
					.into_response());
			}

			inner.call(req).await
		})
	}
}

// vim: ts=4
