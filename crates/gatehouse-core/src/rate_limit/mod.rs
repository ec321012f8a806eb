//! Tier-based rate limiting: the limiter family, violation bookkeeping,
//! and the tower middleware that applies them to routes.

pub mod limiter;
pub mod middleware;

pub use limiter::{LimiterConfig, RateLimitManager, TierLimiter};
pub use middleware::RateLimitLayer;

// vim: ts=4
