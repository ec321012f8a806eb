//! Violation storage tests: append-only rows and window counting.

use gatehouse::store_adapter::StoreAdapter;
use gatehouse::types::now;
use gatehouse_store_adapter_sqlite::StoreAdapterSqlite;
use tempfile::TempDir;

async fn create_test_adapter() -> (StoreAdapterSqlite, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter = StoreAdapterSqlite::new(temp_dir.path().join("store.db"))
		.await
		.expect("Failed to create adapter");
	(adapter, temp_dir)
}

#[tokio::test]
async fn test_count_on_empty_store_is_zero() {
	let (adapter, _temp) = create_test_adapter().await;

	let count = adapter.count_violations_since("1.2.3.4", now().add_secs(-900)).await.unwrap();
	assert_eq!(count, 0);
}

#[tokio::test]
async fn test_count_is_scoped_to_ip_and_window() {
	let (adapter, _temp) = create_test_adapter().await;
	let current = now();

	adapter.append_violation("1.2.3.4", "/api/ping", current.add_secs(-1000)).await.unwrap();
	adapter.append_violation("1.2.3.4", "/api/ping", current.add_secs(-100)).await.unwrap();
	adapter.append_violation("1.2.3.4", "/api/data", current).await.unwrap();
	adapter.append_violation("5.6.7.8", "/api/ping", current).await.unwrap();

	let count = adapter
		.count_violations_since("1.2.3.4", current.add_secs(-900))
		.await
		.unwrap();
	// The 1000s-old row is outside the window, the other IP never counts
	assert_eq!(count, 2);
}

#[tokio::test]
async fn test_window_boundary_is_inclusive() {
	let (adapter, _temp) = create_test_adapter().await;
	let current = now();

	adapter.append_violation("1.2.3.4", "/api/ping", current.add_secs(-900)).await.unwrap();

	let count = adapter
		.count_violations_since("1.2.3.4", current.add_secs(-900))
		.await
		.unwrap();
	assert_eq!(count, 1);
}

// vim: ts=4
