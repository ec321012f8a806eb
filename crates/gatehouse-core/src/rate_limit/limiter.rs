//! Rate Limit Manager
//!
//! One shared instance owns a family of per-IP limiters keyed by their
//! `{window, max, message}` configuration, built on the governor crate's
//! GCRA algorithm: burst capacity `max` with a replenish period of
//! `window / max` guarantees no more than `max` accepted requests per IP
//! per contiguous window in steady state. Violations are persisted
//! best-effort and repeated abuse escalates to a block.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use lru::LruCache;
use parking_lot::RwLock;
use serde::Deserialize;

use gatehouse_types::notify_adapter::{Notification, color};
use gatehouse_types::store_adapter::{LicenseType, StoreAdapter};

use crate::blocklist::IpBlocklistManager;
use crate::config::AdmissionConfig;
use crate::notify::Notifier;
use crate::prelude::*;

const GENERIC_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

// SAFETY: 1 is non-zero
const ONE: NonZeroU32 = match NonZeroU32::new(1) {
	Some(v) => v,
	None => unreachable!(),
};

/// Type alias for a keyed rate limiter
type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

// LimiterConfig //
//***************//
/// Identity of one limiter in the family: window length, cap, and the
/// message returned with 429 responses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct LimiterConfig {
	#[serde(rename = "windowMs")]
	pub window_ms: u64,
	pub max: u32,
	#[serde(default)]
	pub message: Option<Box<str>>,
}

impl LimiterConfig {
	pub fn new(window_ms: u64, max: u32) -> Self {
		Self { window_ms, max, message: None }
	}

	pub fn with_message(mut self, message: impl Into<Box<str>>) -> Self {
		self.message = Some(message.into());
		self
	}
}

// TierLimiter //
//*************//
/// A gate bound to one `LimiterConfig`, tracking request counts per source
/// IP.
pub struct TierLimiter {
	config: LimiterConfig,
	limiter: KeyedLimiter,
}

impl TierLimiter {
	fn new(config: LimiterConfig) -> Self {
		let max = NonZeroU32::new(config.max).unwrap_or(ONE);

		// Replenish one permit per window/max so at most `max` requests
		// pass per contiguous window in steady state
		let period_nanos = (config.window_ms.max(1) * 1_000_000) / u64::from(max.get());
		let quota = Quota::with_period(Duration::from_nanos(period_nanos.max(1)))
			.unwrap_or_else(|| Quota::per_second(ONE))
			.allow_burst(max);

		Self { config, limiter: RateLimiter::keyed(quota) }
	}

	/// Check whether a request from `ip` fits the window. On rejection
	/// returns the time until the next permit.
	pub fn check(&self, ip: &IpAddr) -> Result<(), Duration> {
		self.limiter
			.check_key(ip)
			.map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
	}

	/// Message for 429 responses issued by this limiter.
	pub fn message(&self) -> &str {
		self.config.message.as_deref().unwrap_or(GENERIC_LIMIT_MESSAGE)
	}

	pub fn config(&self) -> &LimiterConfig {
		&self.config
	}
}

// RateLimitManager //
//******************//
pub struct RateLimitManager {
	config: Arc<AdmissionConfig>,
	store: Arc<dyn StoreAdapter>,
	blocklist: Arc<IpBlocklistManager>,
	notifier: Notifier,
	default_limiter: Arc<TierLimiter>,
	tiers: HashMap<LicenseType, Arc<TierLimiter>>,
	custom: RwLock<HashMap<LimiterConfig, Arc<TierLimiter>>>,
	/// Last critical alert per IP, for the rate-limited alert policy
	alerted: RwLock<LruCache<IpAddr, Instant>>,
}

impl RateLimitManager {
	pub fn new(
		config: Arc<AdmissionConfig>,
		store: Arc<dyn StoreAdapter>,
		blocklist: Arc<IpBlocklistManager>,
		notifier: Notifier,
	) -> Self {
		let mut tiers = HashMap::new();
		tiers.insert(
			LicenseType::Free,
			Arc::new(TierLimiter::new(config.free_limit.clone())),
		);
		tiers.insert(
			LicenseType::Basic,
			Arc::new(TierLimiter::new(config.basic_limit.clone())),
		);
		tiers.insert(
			LicenseType::Premium,
			Arc::new(TierLimiter::new(config.premium_limit.clone())),
		);
		let default_limiter = Arc::new(TierLimiter::new(config.default_limit.clone()));

		// SAFETY: 4096 is non-zero
		const ALERT_CAP: NonZeroUsize = match NonZeroUsize::new(4096) {
			Some(v) => v,
			None => unreachable!(),
		};

		Self {
			config,
			store,
			blocklist,
			notifier,
			default_limiter,
			tiers,
			custom: RwLock::new(HashMap::new()),
			alerted: RwLock::new(LruCache::new(ALERT_CAP)),
		}
	}

	/// Get or create the limiter bound to `cfg`. Limiters are shared by
	/// config identity so every route using the same cfg draws from the
	/// same per-IP state.
	pub fn custom_limiter(&self, cfg: LimiterConfig) -> Arc<TierLimiter> {
		if let Some(limiter) = self.custom.read().get(&cfg) {
			return limiter.clone();
		}
		let mut custom = self.custom.write();
		custom
			.entry(cfg.clone())
			.or_insert_with(|| Arc::new(TierLimiter::new(cfg)))
			.clone()
	}

	/// Conservative limiter for untiered routes.
	pub fn default_limiter(&self) -> Arc<TierLimiter> {
		self.default_limiter.clone()
	}

	/// Select a limiter for the license tier; absent license gets the
	/// default.
	pub fn limiter_for(&self, typ: Option<LicenseType>) -> Arc<TierLimiter> {
		match typ {
			Some(typ) => self.tiers.get(&typ).cloned().unwrap_or_else(|| self.default_limiter()),
			None => self.default_limiter(),
		}
	}

	/// Persist one violation and run the escalation check. Best-effort: a
	/// storage failure is logged and nothing propagates, because the 429
	/// that triggered this has already been decided.
	pub async fn record_violation(&self, ip: &IpAddr, path: &str) {
		if let Err(err) = self.store.append_violation(&ip.to_string(), path, now()).await {
			warn!(ip = %ip, path, "Failed to record rate limit violation: {}", err);
			return;
		}
		debug!(ip = %ip, path, "Rate limit violation recorded");

		let count = self.violation_count(ip).await;
		if count >= self.config.escalate_violations {
			let ttl = Duration::from_secs(self.config.escalate_block_secs);
			if let Err(err) = self
				.blocklist
				.block(&ip.to_string(), "Repeated rate limit violations", Some(ttl))
				.await
			{
				warn!(ip = %ip, "Failed to escalate after repeated violations: {}", err);
			}
		}
	}

	/// Count violations for `ip` in the trailing window, emitting the
	/// critical alert when the threshold is reached. A storage failure
	/// yields 0 and a logged error, never a propagated one.
	pub async fn violation_count(&self, ip: &IpAddr) -> u64 {
		let since = now().add_secs(-(self.config.violation_window_secs as i64));
		match self.store.count_violations_since(&ip.to_string(), since).await {
			Ok(count) => {
				if count >= self.config.critical_violations {
					self.alert_critical(ip, count);
				}
				count
			}
			Err(err) => {
				error!(ip = %ip, "Failed to count rate limit violations: {}", err);
				0
			}
		}
	}

	/// Emit the critical-violations alert, suppressed per IP inside the
	/// configured interval. Interval 0 alerts on every qualifying call.
	fn alert_critical(&self, ip: &IpAddr, count: u64) {
		let interval = Duration::from_secs(self.config.alert_interval_secs);
		if !interval.is_zero() {
			let mut alerted = self.alerted.write();
			if alerted.get(ip).is_some_and(|last| last.elapsed() < interval) {
				return;
			}
			alerted.put(*ip, Instant::now());
		}

		warn!(ip = %ip, count, "Critical rate limit violations");
		self.notifier.notify(
			Notification::new(
				"Critical Rate Limit Violations",
				format!("`{}` keeps exceeding its rate limit", ip),
				color::ORANGE,
			)
			.field("IP", ip.to_string())
			.field("Violations", count.to_string()),
		);
	}
}

impl std::fmt::Debug for RateLimitManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RateLimitManager")
			.field("tiers", &self.tiers.len())
			.field("custom", &self.custom.read().len())
			.finish()
	}
}


// vim: ts=4
