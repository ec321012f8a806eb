//! Adapter that stores the admission-control records: licenses, blocked
//! IPs, and rate-limit violations.
//!
//! The three admission components only ever talk to storage through this
//! trait, so the persistence technology is a deployment choice. Every call
//! is expected to return within the adapter's bounded timeout; a timeout
//! surfaces as `Error::Timeout` and is handled by each component under its
//! stated failure policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

// LicenseType //
//*************//
/// The closed set of license tiers.
///
/// Stored values outside this set normalize to `Free`; the gate never
/// attaches an unrecognized tier to a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenseType {
	#[default]
	Free,
	Basic,
	Premium,
}

impl LicenseType {
	/// Normalize a stored tier value, defaulting to `Free` for anything
	/// outside the closed set.
	pub fn normalize(value: &str) -> Self {
		match value.to_ascii_uppercase().as_str() {
			"BASIC" => LicenseType::Basic,
			"PREMIUM" => LicenseType::Premium,
			_ => LicenseType::Free,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LicenseType::Free => "FREE",
			LicenseType::Basic => "BASIC",
			LicenseType::Premium => "PREMIUM",
		}
	}
}

impl std::fmt::Display for LicenseType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

// License //
//*********//
/// A provisioned credential granting tiered access with usage quotas.
///
/// Created by out-of-scope provisioning; mutated only by the gate's
/// `record_license_use` on successful checks; never deleted by this
/// subsystem. `request_count` is monotonic and `ips` is bounded by the
/// deployment's `max_ips`.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
pub struct License {
	pub key: Box<str>,
	#[serde(rename = "type")]
	pub typ: LicenseType,
	/// Optional HWID allowlist; `None` or empty means any HWID is accepted
	pub hwids: Option<Box<[Box<str>]>>,
	/// Recently seen client IPs, oldest first
	pub ips: Vec<Box<str>>,
	#[serde(rename = "requestCount")]
	pub request_count: u64,
	#[serde(rename = "requestLimit")]
	pub request_limit: Option<u64>,
	#[serde(rename = "validUntil")]
	pub valid_until: Timestamp,
	#[serde(rename = "lastUsedIp")]
	pub last_used_ip: Option<Box<str>>,
	#[serde(rename = "lastUsedHwid")]
	pub last_used_hwid: Option<Box<str>>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
}

impl License {
	/// Whether the given HWID passes the allowlist.
	///
	/// An absent HWID or an absent/empty allowlist always passes; binding
	/// is only enforced when both sides are present.
	pub fn hwid_allowed(&self, hwid: Option<&str>) -> bool {
		match (hwid, self.hwids.as_deref()) {
			(Some(hwid), Some(allow)) if !allow.is_empty() => {
				allow.iter().any(|h| h.as_ref() == hwid)
			}
			_ => true,
		}
	}
}

/// Data for creating a license. Provisioning policy is out of scope; this
/// exists for operator tooling and test fixtures.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateLicense {
	pub key: Box<str>,
	#[serde(rename = "type", default)]
	pub typ: LicenseType,
	pub hwids: Option<Box<[Box<str>]>>,
	#[serde(rename = "requestLimit")]
	pub request_limit: Option<u64>,
	#[serde(rename = "validUntil")]
	pub valid_until: Timestamp,
}

// BlockedIp //
//***********//
/// An IP ban row. At most one active row per IP; rows are soft-closed
/// (`is_active = false`), never deleted, so the block history stays
/// auditable.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
pub struct BlockedIp {
	#[serde(rename = "ipAddress")]
	pub ip_address: Box<str>,
	#[serde(rename = "isActive")]
	pub is_active: bool,
	/// `None` = permanent
	#[serde(rename = "expiresAt")]
	pub expires_at: Option<Timestamp>,
	pub reason: Box<str>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
}

impl BlockedIp {
	/// Whether this block has outlived its ttl. Permanent blocks never
	/// expire.
	pub fn is_expired(&self, now: Timestamp) -> bool {
		self.expires_at.is_some_and(|exp| exp <= now)
	}
}

// RateLimitViolation //
//********************//
/// Append-only record of a rejected over-limit request. Queried via
/// count-in-window; pruning is out of scope.
#[derive(Clone, Debug, Serialize)]
pub struct RateLimitViolation {
	pub id: i64,
	#[serde(rename = "ipAddress")]
	pub ip_address: Box<str>,
	pub path: Box<str>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
}

// StoreAdapter //
//**************//
#[async_trait]
pub trait StoreAdapter: Debug + Send + Sync {
	/// # Licenses
	async fn read_license(&self, key: &str) -> GhResult<License>;
	async fn create_license(&self, license: &CreateLicense) -> GhResult<()>;
	/// Record one successful admission: atomically increment
	/// `request_count`, append `ip` to the seen list (FIFO-evicting the
	/// oldest beyond `max_ips`), and update `last_used_ip`/`last_used_hwid`.
	/// An admission without a resolvable source address still counts.
	///
	/// The counter increment must be atomic at the storage layer; the ips
	/// list update may be read-modify-write (eventual consistency is
	/// acceptable there).
	async fn record_license_use(
		&self,
		key: &str,
		ip: Option<&str>,
		hwid: Option<&str>,
		max_ips: usize,
	) -> GhResult<()>;

	/// # Blocked IPs
	/// Read the active block row for an IP, if any. Expiry is judged by the
	/// caller; an active-but-expired row is still returned.
	async fn read_active_block(&self, ip: &str) -> GhResult<Option<BlockedIp>>;
	/// Upsert an active block for an IP (at most one active row per IP).
	async fn upsert_block(
		&self,
		ip: &str,
		reason: &str,
		expires_at: Option<Timestamp>,
	) -> GhResult<()>;
	/// Soft-close the active block for an IP. Returns `false` if there was
	/// none (idempotent no-op).
	async fn release_block(&self, ip: &str) -> GhResult<bool>;
	/// All rows with `is_active = true` and `expires_at <= now`.
	async fn list_expired_blocks(&self, now: Timestamp) -> GhResult<Vec<BlockedIp>>;
	/// List block rows, optionally only the active ones, newest first.
	async fn list_blocks(&self, active_only: bool) -> GhResult<Vec<BlockedIp>>;

	/// # Rate limit violations
	async fn append_violation(&self, ip: &str, path: &str, at: Timestamp) -> GhResult<()>;
	/// Count violations for `ip` with `created_at >= since`.
	async fn count_violations_since(&self, ip: &str, since: Timestamp) -> GhResult<u64>;
}


// vim: ts=4
