//! License Validator
//!
//! Judges a request's license key, source IP, and HWID against the stored
//! license in a fixed, fail-fast order. `check_license` is a pure read;
//! usage mutation happens only in the gate's commit step. Policy outcomes
//! are a closed enum so the gate can map them to response codes
//! exhaustively; infrastructure failures stay in the shared error type and
//! collapse to the generic denial.

use lru::LruCache;
use parking_lot::RwLock;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_types::notify_adapter::{Notification, color};
use gatehouse_types::store_adapter::{License, StoreAdapter};

use crate::blocklist::IpBlocklistManager;
use crate::config::AdmissionConfig;
use crate::extract::LicenseCtx;
use crate::notify::Notifier;
use crate::prelude::*;

// Deny //
//******//
/// The closed set of policy denials, in check order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deny {
	LicenseRequired,
	LicenseNotFound,
	IpBlocked,
	HwidMismatch,
	LicenseExpired,
	RequestLimitExceeded,
}

impl Deny {
	/// Machine-readable constant for the rejection body.
	pub fn code(&self) -> &'static str {
		match self {
			Deny::LicenseRequired => "LICENSE_REQUIRED",
			Deny::LicenseNotFound => "LICENSE_NOT_FOUND",
			Deny::IpBlocked => "IP_BLOCKED",
			Deny::HwidMismatch => "HWID_MISMATCH",
			Deny::LicenseExpired => "LICENSE_EXPIRED",
			Deny::RequestLimitExceeded => "REQUEST_LIMIT_EXCEEDED",
		}
	}

	/// Human-readable reason for the rejection body.
	pub fn reason(&self) -> &'static str {
		match self {
			Deny::LicenseRequired => "License key is required",
			Deny::LicenseNotFound => "License key is not valid",
			Deny::IpBlocked => "Source address is blocked",
			Deny::HwidMismatch => "Hardware ID is not authorized for this license",
			Deny::LicenseExpired => "License has expired",
			Deny::RequestLimitExceeded => "License request limit has been reached",
		}
	}
}

impl std::fmt::Display for Deny {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.reason())
	}
}

// CheckError //
//************//
/// Outcome of a failed admission check: either a policy denial from the
/// closed set, or an infrastructure failure that must not leak.
#[derive(Debug)]
pub enum CheckError {
	Deny(Deny),
	Store(Error),
}

impl CheckError {
	/// Code for the 403 body. Everything outside the closed deny set maps
	/// to the default arm.
	pub fn code(&self) -> &'static str {
		match self {
			CheckError::Deny(deny) => deny.code(),
			CheckError::Store(_) => "ACCESS_DENIED",
		}
	}

	pub fn reason(&self) -> &'static str {
		match self {
			CheckError::Deny(deny) => deny.reason(),
			CheckError::Store(_) => "Access denied",
		}
	}
}

impl From<Error> for CheckError {
	fn from(err: Error) -> Self {
		CheckError::Store(err)
	}
}

impl From<Deny> for CheckError {
	fn from(deny: Deny) -> Self {
		CheckError::Deny(deny)
	}
}

// LicenseValidator //
//******************//
/// Per-IP failed-admission bookkeeping for the escalation path
#[derive(Clone, Copy, Debug)]
struct FailedAttempts {
	count: u32,
	window_start: Timestamp,
}

pub struct LicenseValidator {
	config: Arc<AdmissionConfig>,
	store: Arc<dyn StoreAdapter>,
	blocklist: Arc<IpBlocklistManager>,
	notifier: Notifier,
	failed: RwLock<LruCache<IpAddr, FailedAttempts>>,
}

impl LicenseValidator {
	pub fn new(
		config: Arc<AdmissionConfig>,
		store: Arc<dyn StoreAdapter>,
		blocklist: Arc<IpBlocklistManager>,
		notifier: Notifier,
	) -> Self {
		// SAFETY: 4096 is non-zero
		const FAILED_CAP: NonZeroUsize = match NonZeroUsize::new(4096) {
			Some(v) => v,
			None => unreachable!(),
		};
		Self {
			config,
			store,
			blocklist,
			notifier,
			failed: RwLock::new(LruCache::new(FAILED_CAP)),
		}
	}

	/// Validate a license without consuming it.
	///
	/// Checks run in fixed order and the first failure wins: key present,
	/// license exists, source IP not blocked, HWID in the allowlist, not
	/// expired, under quota. Policy violations alert; input errors do not.
	/// Success returns the license unchanged.
	pub async fn check_license(
		&self,
		license_key: Option<&str>,
		client_ip: Option<IpAddr>,
		hwid: Option<&str>,
	) -> Result<License, CheckError> {
		let Some(key) = license_key.filter(|key| !key.is_empty()) else {
			return Err(Deny::LicenseRequired.into());
		};

		let license = match self.store.read_license(key).await {
			Ok(license) => license,
			Err(Error::NotFound) => return Err(Deny::LicenseNotFound.into()),
			Err(err) => return Err(err.into()),
		};

		if let Some(ip) = client_ip {
			// Storage failures here propagate; never default to "not blocked"
			if self.blocklist.is_blocked(&ip.to_string()).await? {
				self.alert_violation(&license, Deny::IpBlocked, Some(ip), hwid);
				return Err(Deny::IpBlocked.into());
			}
		}

		if !license.hwid_allowed(hwid) {
			self.alert_violation(&license, Deny::HwidMismatch, client_ip, hwid);
			return Err(Deny::HwidMismatch.into());
		}

		if license.valid_until < now() {
			self.alert_violation(&license, Deny::LicenseExpired, client_ip, hwid);
			return Err(Deny::LicenseExpired.into());
		}

		if let Some(limit) = license.request_limit {
			if license.request_count >= limit {
				self.alert_violation(&license, Deny::RequestLimitExceeded, client_ip, hwid);
				return Err(Deny::RequestLimitExceeded.into());
			}
		}

		Ok(license)
	}

	/// Consume one admission on a successfully checked license: atomically
	/// bump the request counter, fold the client IP into the bounded seen
	/// list, and record last-used identifiers. Returns the context the gate
	/// attaches to the request.
	pub async fn commit_use(
		&self,
		license: &License,
		client_ip: Option<IpAddr>,
		hwid: Option<&str>,
	) -> GhResult<LicenseCtx> {
		let ip = client_ip.map(|ip| ip.to_string());
		self.store
			.record_license_use(&license.key, ip.as_deref(), hwid, self.config.max_ips)
			.await?;

		Ok(LicenseCtx { key: license.key.clone(), typ: license.typ })
	}

	/// Note one failed admission attempt from `ip`. Best-effort: escalates
	/// to a temporary block once an IP accumulates too many failures inside
	/// the window, and never fails the caller.
	pub async fn record_failed_attempt(&self, client_ip: Option<IpAddr>) {
		let Some(ip) = client_ip else { return };

		let window = self.config.failed_attempt_window_secs as i64;
		let escalate = {
			let mut failed = self.failed.write();
			let entry = failed
				.get_or_insert_mut(ip, || FailedAttempts { count: 0, window_start: now() });
			if now() > entry.window_start.add_secs(window) {
				entry.count = 0;
				entry.window_start = now();
			}
			entry.count = entry.count.saturating_add(1);
			if entry.count >= self.config.failed_attempt_limit {
				entry.count = 0;
				true
			} else {
				false
			}
		};

		if escalate {
			let ttl = Duration::from_secs(self.config.failed_attempt_block_secs);
			if let Err(err) = self
				.blocklist
				.block(&ip.to_string(), "Repeated failed admission attempts", Some(ttl))
				.await
			{
				warn!(ip = %ip, "Failed to escalate after repeated admission failures: {}", err);
			}
		}
	}

	fn alert_violation(
		&self,
		license: &License,
		deny: Deny,
		client_ip: Option<IpAddr>,
		hwid: Option<&str>,
	) {
		self.notifier.notify(
			Notification::new("License Violation", deny.reason(), color::RED)
				.field("Code", deny.code())
				.field("License", license.key.as_ref())
				.field("IP", client_ip.map_or("unknown".to_string(), |ip| ip.to_string()))
				.field("HWID", hwid.unwrap_or("none")),
		);
	}
}

impl std::fmt::Debug for LicenseValidator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LicenseValidator").finish()
	}
}

// vim: ts=4
