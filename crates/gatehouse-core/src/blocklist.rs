//! IP Blocklist Manager
//!
//! Tracks active and expired IP bans against the persistent store. One
//! long-lived instance per process, shared by the license validator and the
//! rate limiter; the periodic sweep releases expired bans independently of
//! the request path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_types::notify_adapter::{Notification, color};
use gatehouse_types::store_adapter::{BlockedIp, StoreAdapter};

use crate::app::App;
use crate::notify::Notifier;
use crate::prelude::*;
use crate::scheduler::Task;

pub struct IpBlocklistManager {
	store: Arc<dyn StoreAdapter>,
	notifier: Notifier,
}

impl IpBlocklistManager {
	pub fn new(store: Arc<dyn StoreAdapter>, notifier: Notifier) -> Self {
		Self { store, notifier }
	}

	/// Whether `ip` currently has an active, unexpired block.
	///
	/// A storage failure propagates to the caller; admission must never
	/// silently default to "not blocked". An active row whose expiry has
	/// passed but has not been swept yet counts as not blocked.
	pub async fn is_blocked(&self, ip: &str) -> GhResult<bool> {
		let Some(block) = self.store.read_active_block(ip).await? else {
			return Ok(false);
		};
		Ok(!block.is_expired(now()))
	}

	/// Upsert an active block for `ip`. Re-blocking updates reason and
	/// expiry. `ttl` of `None` blocks permanently.
	pub async fn block(&self, ip: &str, reason: &str, ttl: Option<Duration>) -> GhResult<()> {
		let expires_at = ttl.map(|ttl| now().add_secs(ttl.as_secs() as i64));
		self.store.upsert_block(ip, reason, expires_at).await?;

		info!(ip, reason, ?expires_at, "IP blocked");
		self.notifier.notify(
			Notification::new("IP Blocked", format!("`{}` has been blocked", ip), color::RED)
				.field("Reason", reason)
				.field(
					"Expires",
					expires_at.map_or("never".to_string(), |ts| ts.to_string()),
				),
		);
		Ok(())
	}

	/// Soft-close the active block for `ip`. No-op if none is active.
	pub async fn unblock(&self, ip: &str) -> GhResult<()> {
		if self.store.release_block(ip).await? {
			info!(ip, "IP unblocked");
		}
		Ok(())
	}

	/// Release every active block whose expiry has passed. Runs on the
	/// sweep schedule; a per-row failure is logged and the remaining rows
	/// are still processed. Returns the number of released blocks.
	pub async fn auto_unblock_expired(&self) -> GhResult<usize> {
		let expired = self.store.list_expired_blocks(now()).await?;
		if expired.is_empty() {
			return Ok(0);
		}

		let mut released = 0usize;
		for row in &expired {
			match self.store.release_block(&row.ip_address).await {
				Ok(_) => released += 1,
				Err(err) => warn!(ip = %row.ip_address, "Failed to auto-unblock: {}", err),
			}
		}

		info!(released, "Auto-unblocked expired IPs");
		if released > 0 {
			self.notifier.notify(Notification::new(
				"IP Auto-Unblock",
				format!("Released {} expired block(s)", released),
				color::GREEN,
			));
		}
		Ok(released)
	}

	/// List block rows for operator tooling, newest first.
	pub async fn list(&self, active_only: bool) -> GhResult<Vec<BlockedIp>> {
		self.store.list_blocks(active_only).await
	}
}

// BlocklistSweepTask //
//********************//
/// Scheduler task wrapping the expired-block sweep.
pub struct BlocklistSweepTask;

#[async_trait]
impl Task<App> for BlocklistSweepTask {
	fn name(&self) -> &'static str {
		"blocklist.sweep"
	}

	async fn run(&self, app: &App) -> GhResult<()> {
		app.blocklist.auto_unblock_expired().await?;
		Ok(())
	}
}

// vim: ts=4
