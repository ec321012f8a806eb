//! Admission-control configuration.
//!
//! One `AdmissionConfig` is loaded at startup and shared read-only by all
//! three components. Every field has a deployment-safe default so an empty
//! config file yields a working instance.

use serde::Deserialize;

use crate::rate_limit::LimiterConfig;

/// Tier caps, windows, thresholds, and trust boundaries for one deployment.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
	/// Bound on the per-license recently-seen IP list (FIFO-evicted)
	pub max_ips: usize,
	/// Number of trusted reverse proxies in front of this process.
	/// 0 = trust nothing, use the socket peer address.
	pub trusted_proxy_hops: usize,
	/// Interval of the expired-block sweep, in seconds
	pub sweep_interval_secs: u64,

	/// Limiter for untiered routes
	pub default_limit: LimiterConfig,
	pub free_limit: LimiterConfig,
	pub basic_limit: LimiterConfig,
	pub premium_limit: LimiterConfig,

	/// Trailing window over which violations are counted, in seconds
	pub violation_window_secs: u64,
	/// Violations in the window at which the critical alert fires
	pub critical_violations: u64,
	/// Minimum seconds between critical alerts for one IP; 0 = alert on
	/// every qualifying call
	pub alert_interval_secs: u64,
	/// Violations in the window at which the IP is blocked
	pub escalate_violations: u64,
	/// Duration of an escalation block, in seconds
	pub escalate_block_secs: u64,

	/// Failed admission attempts before the validator blocks an IP
	pub failed_attempt_limit: u32,
	/// Window over which failed attempts are counted, in seconds
	pub failed_attempt_window_secs: u64,
	/// Duration of a failed-attempt block, in seconds
	pub failed_attempt_block_secs: u64,

	/// Capacity of the in-process alert queue; overflow is dropped
	pub notify_queue: usize,
	/// Webhook URL for outbound alerts; absent = alerts only logged
	pub webhook_url: Option<Box<str>>,
}

impl Default for AdmissionConfig {
	fn default() -> Self {
		Self {
			max_ips: 5,
			trusted_proxy_hops: 0,
			sweep_interval_secs: 60,
			default_limit: LimiterConfig::new(60_000, 60),
			free_limit: LimiterConfig::new(60_000, 30),
			basic_limit: LimiterConfig::new(60_000, 120),
			premium_limit: LimiterConfig::new(60_000, 600),
			violation_window_secs: 900,
			critical_violations: 3,
			alert_interval_secs: 300,
			escalate_violations: 10,
			escalate_block_secs: 3600,
			failed_attempt_limit: 5,
			failed_attempt_window_secs: 600,
			failed_attempt_block_secs: 3600,
			notify_queue: 256,
			webhook_url: None,
		}
	}
}

// vim: ts=4
