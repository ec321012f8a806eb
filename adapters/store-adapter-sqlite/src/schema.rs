//! Database schema initialization
//!
//! Creates the admission-control tables and indexes on first start.

use sqlx::SqlitePool;

pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Licenses
	//**********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS licenses (
		license_key text NOT NULL,
		type text NOT NULL DEFAULT 'FREE',
		hwids json,
		ips json,
		request_count integer NOT NULL DEFAULT 0,
		request_limit integer,
		valid_until integer NOT NULL,
		last_used_ip text,
		last_used_hwid text,
		created_at integer NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(license_key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Blocked IPs
	//*************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS blocked_ips (
		block_id integer PRIMARY KEY AUTOINCREMENT,
		ip_address text NOT NULL,
		is_active integer NOT NULL DEFAULT 1,
		expires_at integer,
		reason text,
		created_at integer NOT NULL DEFAULT (unixepoch())
	)",
	)
	.execute(&mut *tx)
	.await?;

	// At most one active row per IP
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_blocked_ips_one_active
		ON blocked_ips(ip_address) WHERE is_active = 1",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_blocked_ips_expiry
		ON blocked_ips(is_active, expires_at)",
	)
	.execute(&mut *tx)
	.await?;

	// Rate limit violations
	//***********************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS rate_limit_violations (
		violation_id integer PRIMARY KEY AUTOINCREMENT,
		ip_address text NOT NULL,
		path text NOT NULL,
		created_at integer NOT NULL
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_violations_ip_time
		ON rate_limit_violations(ip_address, created_at)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
