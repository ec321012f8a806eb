//! SQLite-backed store adapter for the Gatehouse admission records.
//!
//! Every query is bounded by a statement timeout; a timeout surfaces as
//! `Error::Timeout` so the admission components apply their storage-failure
//! policies instead of hanging a request.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool, SqliteRow};
use std::{fmt::Debug, future::Future, path::Path, time::Duration};

use gatehouse::prelude::*;
use gatehouse::store_adapter::{self, BlockedIp, CreateLicense, License};

mod blocked_ip;
mod license;
mod schema;
mod violation;

use schema::init_db;

/// Bound on any single statement
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

// Helper functions
//******************
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Run a query future under the statement timeout.
pub(crate) async fn bounded<T>(fut: impl Future<Output = T>) -> GhResult<T> {
	tokio::time::timeout(QUERY_TIMEOUT, fut).await.map_err(|_| Error::Timeout)
}

pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> GhResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

pub(crate) fn collect_res<T, F>(
	rows: Result<Vec<SqliteRow>, sqlx::Error>,
	f: F,
) -> GhResult<Vec<T>>
where
	F: Fn(SqliteRow) -> Result<T, sqlx::Error>,
{
	let rows = rows.inspect_err(inspect).map_err(|_| Error::DbError)?;
	rows.into_iter()
		.map(|row| f(row).inspect_err(inspect).map_err(|_| Error::DbError))
		.collect()
}

/// Serialize a string list into its json column representation.
pub(crate) fn str_list_json(list: &[Box<str>]) -> String {
	serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

/// Parse a json string-list column, tolerating NULL and junk.
pub(crate) fn parse_str_list(value: Option<String>) -> Vec<Box<str>> {
	value.and_then(|v| serde_json::from_str(&v).ok()).unwrap_or_default()
}

#[derive(Debug)]
pub struct StoreAdapterSqlite {
	db: SqlitePool,
}

impl StoreAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> GhResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.busy_timeout(QUERY_TIMEOUT);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.acquire_timeout(QUERY_TIMEOUT)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}
}

#[async_trait]
impl store_adapter::StoreAdapter for StoreAdapterSqlite {
	// License management
	//********************
	async fn read_license(&self, key: &str) -> GhResult<License> {
		license::read(&self.db, key).await
	}

	async fn create_license(&self, license: &CreateLicense) -> GhResult<()> {
		license::create(&self.db, license).await
	}

	async fn record_license_use(
		&self,
		key: &str,
		ip: Option<&str>,
		hwid: Option<&str>,
		max_ips: usize,
	) -> GhResult<()> {
		license::record_use(&self.db, key, ip, hwid, max_ips).await
	}

	// Blocked IP management
	//***********************
	async fn read_active_block(&self, ip: &str) -> GhResult<Option<BlockedIp>> {
		blocked_ip::read_active(&self.db, ip).await
	}

	async fn upsert_block(
		&self,
		ip: &str,
		reason: &str,
		expires_at: Option<Timestamp>,
	) -> GhResult<()> {
		blocked_ip::upsert(&self.db, ip, reason, expires_at).await
	}

	async fn release_block(&self, ip: &str) -> GhResult<bool> {
		blocked_ip::release(&self.db, ip).await
	}

	async fn list_expired_blocks(&self, now: Timestamp) -> GhResult<Vec<BlockedIp>> {
		blocked_ip::list_expired(&self.db, now).await
	}

	async fn list_blocks(&self, active_only: bool) -> GhResult<Vec<BlockedIp>> {
		blocked_ip::list(&self.db, active_only).await
	}

	// Violation management
	//**********************
	async fn append_violation(&self, ip: &str, path: &str, at: Timestamp) -> GhResult<()> {
		violation::append(&self.db, ip, path, at).await
	}

	async fn count_violations_since(&self, ip: &str, since: Timestamp) -> GhResult<u64> {
		violation::count_since(&self.db, ip, since).await
	}
}

// vim: ts=4
