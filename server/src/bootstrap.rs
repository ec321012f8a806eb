//! Startup wiring: adapters, app state, background tasks, and the HTTP
//! listener.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use gatehouse_core::app::{AppState, VERSION};
use gatehouse_core::notify::WebhookSink;
use gatehouse_store_adapter_sqlite::StoreAdapterSqlite;
use gatehouse_types::notify_adapter::NotifyAdapter;

use crate::prelude::*;
use crate::routes;
use crate::settings::ServerConfig;

pub async fn run(config: ServerConfig) -> GhResult<()> {
	info!("Starting gatehouse v{}", VERSION);

	if let Some(parent) = Path::new(config.db_path.as_ref()).parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	let store = Arc::new(StoreAdapterSqlite::new(config.db_path.as_ref()).await?);

	let sink: Option<Arc<dyn NotifyAdapter>> = match &config.admission.webhook_url {
		Some(url) => Some(Arc::new(WebhookSink::new(url.clone())?)),
		None => {
			info!("No webhook configured, alerts will only be logged");
			None
		}
	};

	let app = AppState::build(config.admission.clone(), store, sink);
	AppState::start_background(&app);

	let router = routes::init(app.clone(), &config);

	let listener = tokio::net::TcpListener::bind(config.listen.as_ref()).await?;
	info!("Listening on {}", config.listen);

	axum::serve(
		listener,
		router.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(shutdown_signal(app))
	.await?;

	Ok(())
}

async fn shutdown_signal(app: App) {
	let ctrl_c = async {
		if tokio::signal::ctrl_c().await.is_err() {
			error!("Failed to install Ctrl+C handler");
		}
	};

	ctrl_c.await;
	info!("Shutting down");
	app.scheduler.shutdown();
}

// vim: ts=4
