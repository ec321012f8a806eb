//! Blocked IP row management
//!
//! Rows are soft-closed, never deleted; the partial unique index keeps at
//! most one active row per IP and the upsert/release pair is idempotent.

use sqlx::{Row, SqlitePool};

use gatehouse::prelude::*;
use gatehouse::store_adapter::BlockedIp;

use crate::{bounded, collect_res, inspect, map_res};

fn block_from_row(row: sqlx::sqlite::SqliteRow) -> Result<BlockedIp, sqlx::Error> {
	Ok(BlockedIp {
		ip_address: row.try_get::<String, _>("ip_address")?.into(),
		is_active: row.try_get::<i64, _>("is_active")? != 0,
		expires_at: row.try_get::<Option<i64>, _>("expires_at")?.map(Timestamp),
		reason: row.try_get::<Option<String>, _>("reason")?.unwrap_or_default().into(),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

pub(crate) async fn read_active(db: &SqlitePool, ip: &str) -> GhResult<Option<BlockedIp>> {
	let row = bounded(
		sqlx::query(
			"SELECT ip_address, is_active, expires_at, reason, created_at
			FROM blocked_ips WHERE ip_address = ? AND is_active = 1",
		)
		.bind(ip)
		.fetch_one(db),
	)
	.await?;

	match map_res(row, block_from_row) {
		Ok(block) => Ok(Some(block)),
		Err(Error::NotFound) => Ok(None),
		Err(err) => Err(err),
	}
}

pub(crate) async fn upsert(
	db: &SqlitePool,
	ip: &str,
	reason: &str,
	expires_at: Option<Timestamp>,
) -> GhResult<()> {
	// Re-blocking updates reason and expiry on the existing active row
	let res = bounded(
		sqlx::query(
			"UPDATE blocked_ips SET reason = ?, expires_at = ?
			WHERE ip_address = ? AND is_active = 1",
		)
		.bind(reason)
		.bind(expires_at.map(|ts| ts.0))
		.bind(ip)
		.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	if res.rows_affected() > 0 {
		return Ok(());
	}

	bounded(
		sqlx::query(
			"INSERT INTO blocked_ips (ip_address, is_active, expires_at, reason)
			VALUES (?, 1, ?, ?)",
		)
		.bind(ip)
		.bind(expires_at.map(|ts| ts.0))
		.bind(reason)
		.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn release(db: &SqlitePool, ip: &str) -> GhResult<bool> {
	let res = bounded(
		sqlx::query("UPDATE blocked_ips SET is_active = 0 WHERE ip_address = ? AND is_active = 1")
			.bind(ip)
			.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected() > 0)
}

pub(crate) async fn list_expired(db: &SqlitePool, now: Timestamp) -> GhResult<Vec<BlockedIp>> {
	let rows = bounded(
		sqlx::query(
			"SELECT ip_address, is_active, expires_at, reason, created_at
			FROM blocked_ips
			WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at <= ?",
		)
		.bind(now.0)
		.fetch_all(db),
	)
	.await?;

	collect_res(rows, block_from_row)
}

pub(crate) async fn list(db: &SqlitePool, active_only: bool) -> GhResult<Vec<BlockedIp>> {
	let query = if active_only {
		"SELECT ip_address, is_active, expires_at, reason, created_at
		FROM blocked_ips WHERE is_active = 1 ORDER BY block_id DESC"
	} else {
		"SELECT ip_address, is_active, expires_at, reason, created_at
		FROM blocked_ips ORDER BY block_id DESC"
	};

	let rows = bounded(sqlx::query(query).fetch_all(db)).await?;
	collect_res(rows, block_from_row)
}

// vim: ts=4
