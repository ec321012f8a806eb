//! Rate-limit violation rows: append-only, counted in a trailing window.

use sqlx::{Row, SqlitePool};

use gatehouse::prelude::*;

use crate::{bounded, inspect, map_res};

pub(crate) async fn append(
	db: &SqlitePool,
	ip: &str,
	path: &str,
	at: Timestamp,
) -> GhResult<()> {
	bounded(
		sqlx::query(
			"INSERT INTO rate_limit_violations (ip_address, path, created_at) VALUES (?, ?, ?)",
		)
		.bind(ip)
		.bind(path)
		.bind(at.0)
		.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn count_since(db: &SqlitePool, ip: &str, since: Timestamp) -> GhResult<u64> {
	let row = bounded(
		sqlx::query(
			"SELECT COUNT(*) AS n FROM rate_limit_violations
			WHERE ip_address = ? AND created_at >= ?",
		)
		.bind(ip)
		.bind(since.0)
		.fetch_one(db),
	)
	.await?;

	map_res(row, |row| row.try_get::<i64, _>("n")).map(|n| n as u64)
}

// vim: ts=4
