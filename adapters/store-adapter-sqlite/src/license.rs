//! License row management
//!
//! The request counter is incremented with a single atomic UPDATE so
//! concurrent admissions on the same key never lose updates. The seen-IP
//! list is read-modify-write; eventual consistency is acceptable there.

use sqlx::{Row, SqlitePool};

use gatehouse::prelude::*;
use gatehouse::store_adapter::{CreateLicense, License, LicenseType};

use crate::{bounded, inspect, map_res, parse_str_list, str_list_json};

fn license_from_row(row: sqlx::sqlite::SqliteRow) -> Result<License, sqlx::Error> {
	let typ: String = row.try_get("type")?;
	let hwids: Option<String> = row.try_get("hwids")?;
	let hwids = hwids.and_then(|v| serde_json::from_str::<Vec<Box<str>>>(&v).ok()).map(|v| {
		v.into_boxed_slice()
	});

	Ok(License {
		key: row.try_get::<String, _>("license_key")?.into(),
		// Unrecognized stored tiers normalize to FREE
		typ: LicenseType::normalize(&typ),
		hwids,
		ips: parse_str_list(row.try_get("ips")?),
		request_count: row.try_get::<i64, _>("request_count")? as u64,
		request_limit: row.try_get::<Option<i64>, _>("request_limit")?.map(|v| v as u64),
		valid_until: Timestamp(row.try_get("valid_until")?),
		last_used_ip: row.try_get::<Option<String>, _>("last_used_ip")?.map(Into::into),
		last_used_hwid: row.try_get::<Option<String>, _>("last_used_hwid")?.map(Into::into),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

pub(crate) async fn read(db: &SqlitePool, key: &str) -> GhResult<License> {
	let row = bounded(
		sqlx::query(
			"SELECT license_key, type, hwids, ips, request_count, request_limit,
				valid_until, last_used_ip, last_used_hwid, created_at
			FROM licenses WHERE license_key = ?",
		)
		.bind(key)
		.fetch_one(db),
	)
	.await?;

	map_res(row, license_from_row)
}

pub(crate) async fn create(db: &SqlitePool, license: &CreateLicense) -> GhResult<()> {
	let hwids = license.hwids.as_deref().map(str_list_json);

	bounded(
		sqlx::query(
			"INSERT INTO licenses (license_key, type, hwids, ips, request_limit, valid_until)
			VALUES (?, ?, ?, '[]', ?, ?)",
		)
		.bind(license.key.as_ref())
		.bind(license.typ.as_str())
		.bind(hwids)
		.bind(license.request_limit.map(|v| v as i64))
		.bind(license.valid_until.0)
		.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn record_use(
	db: &SqlitePool,
	key: &str,
	ip: Option<&str>,
	hwid: Option<&str>,
	max_ips: usize,
) -> GhResult<()> {
	// Atomic counter bump; last_used_ip keeps its old value when the
	// request had no resolvable source address
	let res = bounded(
		sqlx::query(
			"UPDATE licenses SET
				request_count = request_count + 1,
				last_used_ip = COALESCE(?, last_used_ip),
				last_used_hwid = ?
			WHERE license_key = ?",
		)
		.bind(ip)
		.bind(hwid)
		.bind(key)
		.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}

	if let Some(ip) = ip {
		fold_seen_ip(db, key, ip, max_ips).await?;
	}

	Ok(())
}

/// Append `ip` to the seen list if new, FIFO-evicting the oldest entries
/// beyond `max_ips`.
async fn fold_seen_ip(db: &SqlitePool, key: &str, ip: &str, max_ips: usize) -> GhResult<()> {
	let row = bounded(
		sqlx::query("SELECT ips FROM licenses WHERE license_key = ?")
			.bind(key)
			.fetch_one(db),
	)
	.await?;
	let mut ips = map_res(row, |row| row.try_get::<Option<String>, _>("ips"))
		.map(parse_str_list)?;

	if ips.iter().any(|seen| seen.as_ref() == ip) {
		return Ok(());
	}
	ips.push(ip.into());
	while ips.len() > max_ips {
		ips.remove(0);
	}

	bounded(
		sqlx::query("UPDATE licenses SET ips = ? WHERE license_key = ?")
			.bind(str_list_json(&ips))
			.bind(key)
			.execute(db),
	)
	.await?
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

// vim: ts=4
