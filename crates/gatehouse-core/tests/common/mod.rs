//! Shared fixtures: an in-memory store with failure toggles and a
//! recording notification sink.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use http_body_util::BodyExt;

use gatehouse_core::app::{App, AppState};
use gatehouse_core::config::AdmissionConfig;
use gatehouse_types::error::{Error, GhResult};
use gatehouse_types::notify_adapter::{Notification, NotifyAdapter};
use gatehouse_types::store_adapter::{
	BlockedIp, CreateLicense, License, LicenseType, RateLimitViolation, StoreAdapter,
};
use gatehouse_types::types::{Timestamp, now};

// MemStore //
//**********//
#[derive(Debug, Default)]
pub struct MemStore {
	pub licenses: Mutex<HashMap<Box<str>, License>>,
	pub blocks: Mutex<Vec<BlockedIp>>,
	pub violations: Mutex<Vec<RateLimitViolation>>,
	next_violation_id: AtomicI64,
	/// Fail every operation
	pub fail_all: AtomicBool,
	/// Fail only the violation operations
	pub fail_violations: AtomicBool,
	/// IPs whose release_block call fails
	pub fail_release_ips: Mutex<HashSet<String>>,
	pub release_calls: AtomicUsize,
}

impl MemStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	fn check_fail(&self) -> GhResult<()> {
		if self.fail_all.load(Ordering::SeqCst) { Err(Error::DbError) } else { Ok(()) }
	}

	fn check_fail_violations(&self) -> GhResult<()> {
		self.check_fail()?;
		if self.fail_violations.load(Ordering::SeqCst) { Err(Error::DbError) } else { Ok(()) }
	}

	pub fn license(&self, key: &str) -> Option<License> {
		self.licenses.lock().get(key).cloned()
	}

	pub fn active_block(&self, ip: &str) -> Option<BlockedIp> {
		self.blocks.lock().iter().find(|b| b.is_active && b.ip_address.as_ref() == ip).cloned()
	}

	pub fn violation_rows(&self) -> Vec<RateLimitViolation> {
		self.violations.lock().clone()
	}

	pub fn seed_license(&self, license: License) {
		self.licenses.lock().insert(license.key.clone(), license);
	}

	pub fn seed_block(&self, ip: &str, is_active: bool, expires_at: Option<Timestamp>) {
		self.blocks.lock().push(BlockedIp {
			ip_address: ip.into(),
			is_active,
			expires_at,
			reason: "seeded".into(),
			created_at: now(),
		});
	}
}

#[async_trait]
impl StoreAdapter for MemStore {
	async fn read_license(&self, key: &str) -> GhResult<License> {
		self.check_fail()?;
		self.licenses.lock().get(key).cloned().ok_or(Error::NotFound)
	}

	async fn create_license(&self, license: &CreateLicense) -> GhResult<()> {
		self.check_fail()?;
		self.seed_license(License {
			key: license.key.clone(),
			typ: license.typ,
			hwids: license.hwids.clone(),
			ips: vec![],
			request_count: 0,
			request_limit: license.request_limit,
			valid_until: license.valid_until,
			last_used_ip: None,
			last_used_hwid: None,
			created_at: now(),
		});
		Ok(())
	}

	async fn record_license_use(
		&self,
		key: &str,
		ip: Option<&str>,
		hwid: Option<&str>,
		max_ips: usize,
	) -> GhResult<()> {
		self.check_fail()?;
		let mut licenses = self.licenses.lock();
		let license = licenses.get_mut(key).ok_or(Error::NotFound)?;

		license.request_count += 1;
		if let Some(ip) = ip {
			if !license.ips.iter().any(|seen| seen.as_ref() == ip) {
				license.ips.push(ip.into());
			}
			while license.ips.len() > max_ips {
				license.ips.remove(0);
			}
			license.last_used_ip = Some(ip.into());
		}
		license.last_used_hwid = hwid.map(Into::into);
		Ok(())
	}

	async fn read_active_block(&self, ip: &str) -> GhResult<Option<BlockedIp>> {
		self.check_fail()?;
		Ok(self.active_block(ip))
	}

	async fn upsert_block(
		&self,
		ip: &str,
		reason: &str,
		expires_at: Option<Timestamp>,
	) -> GhResult<()> {
		self.check_fail()?;
		let mut blocks = self.blocks.lock();
		if let Some(row) = blocks.iter_mut().find(|b| b.is_active && b.ip_address.as_ref() == ip)
		{
			row.reason = reason.into();
			row.expires_at = expires_at;
		} else {
			blocks.push(BlockedIp {
				ip_address: ip.into(),
				is_active: true,
				expires_at,
				reason: reason.into(),
				created_at: now(),
			});
		}
		Ok(())
	}

	async fn release_block(&self, ip: &str) -> GhResult<bool> {
		self.check_fail()?;
		self.release_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_release_ips.lock().contains(ip) {
			return Err(Error::DbError);
		}
		let mut blocks = self.blocks.lock();
		match blocks.iter_mut().find(|b| b.is_active && b.ip_address.as_ref() == ip) {
			Some(row) => {
				row.is_active = false;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	async fn list_expired_blocks(&self, now: Timestamp) -> GhResult<Vec<BlockedIp>> {
		self.check_fail()?;
		Ok(self
			.blocks
			.lock()
			.iter()
			.filter(|b| b.is_active && b.is_expired(now))
			.cloned()
			.collect())
	}

	async fn list_blocks(&self, active_only: bool) -> GhResult<Vec<BlockedIp>> {
		self.check_fail()?;
		Ok(self
			.blocks
			.lock()
			.iter()
			.filter(|b| !active_only || b.is_active)
			.cloned()
			.collect())
	}

	async fn append_violation(&self, ip: &str, path: &str, at: Timestamp) -> GhResult<()> {
		self.check_fail_violations()?;
		let id = self.next_violation_id.fetch_add(1, Ordering::SeqCst);
		self.violations.lock().push(RateLimitViolation {
			id,
			ip_address: ip.into(),
			path: path.into(),
			created_at: at,
		});
		Ok(())
	}

	async fn count_violations_since(&self, ip: &str, since: Timestamp) -> GhResult<u64> {
		self.check_fail_violations()?;
		Ok(self
			.violations
			.lock()
			.iter()
			.filter(|v| v.ip_address.as_ref() == ip && v.created_at >= since)
			.count() as u64)
	}
}

// RecordingSink //
//***************//
#[derive(Debug, Default)]
pub struct RecordingSink {
	pub sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn titles(&self) -> Vec<Box<str>> {
		self.sent.lock().iter().map(|n| n.title.clone()).collect()
	}

	pub fn count_titled(&self, title: &str) -> usize {
		self.sent.lock().iter().filter(|n| n.title.as_ref() == title).count()
	}
}

#[async_trait]
impl NotifyAdapter for RecordingSink {
	async fn send_notification(&self, notification: &Notification) -> GhResult<()> {
		self.sent.lock().push(notification.clone());
		Ok(())
	}
}

// Fixtures //
//**********//
pub fn test_config() -> AdmissionConfig {
	AdmissionConfig {
		// Tests assert on exact alert counts; no suppression by default
		alert_interval_secs: 0,
		..AdmissionConfig::default()
	}
}

pub fn build_app(config: AdmissionConfig) -> (App, Arc<MemStore>, Arc<RecordingSink>) {
	let store = MemStore::new();
	let sink = RecordingSink::new();
	let app = AppState::build(config, store.clone(), Some(sink.clone()));
	(app, store, sink)
}

pub fn license_fixture(key: &str, typ: LicenseType) -> License {
	License {
		key: key.into(),
		typ,
		hwids: None,
		ips: vec![],
		request_count: 0,
		request_limit: None,
		valid_until: now().add_secs(86_400),
		last_used_ip: None,
		last_used_hwid: None,
		created_at: now(),
	}
}

/// Build a request carrying a peer address and optional admission headers.
pub fn request(
	uri: &str,
	peer: &str,
	license_key: Option<&str>,
	hwid: Option<&str>,
) -> Request<Body> {
	let mut builder = Request::builder().uri(uri);
	if let Some(key) = license_key {
		builder = builder.header("x-license-key", key);
	}
	if let Some(hwid) = hwid {
		builder = builder.header("x-hwid", hwid);
	}
	let mut req = builder.body(Body::empty()).unwrap();
	let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
	req.extensions_mut().insert(ConnectInfo(addr));
	req
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	serde_json::from_slice(&bytes).unwrap()
}

/// The notifier drains on a background task; give it a moment.
pub async fn wait_for_alerts(sink: &RecordingSink, at_least: usize) {
	for _ in 0..200 {
		if sink.sent.lock().len() >= at_least {
			return;
		}
		tokio::time::sleep(Duration::from_millis(2)).await;
	}
}

/// Idle long enough for any in-flight notifications to drain.
pub async fn settle() {
	tokio::time::sleep(Duration::from_millis(30)).await;
}

pub fn router_with_gate(app: &App) -> Router {
	use axum::middleware;
	use axum::routing::get;

	use gatehouse_core::extract::OptionalLicense;
	use gatehouse_core::license::gate::license_gate;

	async fn ping(OptionalLicense(license): OptionalLicense) -> String {
		match license {
			Some(license) => format!("pong {}", license.typ),
			None => "pong".to_string(),
		}
	}

	Router::new()
		.route("/api/ping", get(ping))
		.layer(middleware::from_fn_with_state(app.clone(), license_gate))
}

// vim: ts=4
