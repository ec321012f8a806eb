//! App state type
//!
//! One `AppState` is built at startup and passed by handle to every
//! consumer, preserving "one shared instance" semantics for the three
//! admission components without hidden global state.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_types::notify_adapter::NotifyAdapter;
use gatehouse_types::store_adapter::StoreAdapter;

use crate::blocklist::{BlocklistSweepTask, IpBlocklistManager};
use crate::config::AdmissionConfig;
use crate::license::validator::LicenseValidator;
use crate::notify::Notifier;
use crate::rate_limit::limiter::RateLimitManager;
use crate::scheduler::Scheduler;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub config: Arc<AdmissionConfig>,
	pub store: Arc<dyn StoreAdapter>,
	pub notifier: Notifier,
	pub scheduler: Arc<Scheduler<App>>,

	pub blocklist: Arc<IpBlocklistManager>,
	pub validator: Arc<LicenseValidator>,
	pub rate_limiter: Arc<RateLimitManager>,
}

pub type App = Arc<AppState>;

impl AppState {
	/// Wire the admission components onto one shared state. Must run
	/// inside a tokio runtime (the notifier spawns its drain task here).
	pub fn build(
		config: AdmissionConfig,
		store: Arc<dyn StoreAdapter>,
		sink: Option<Arc<dyn NotifyAdapter>>,
	) -> App {
		let config = Arc::new(config);
		let notifier = match sink {
			Some(sink) => Notifier::spawn(sink, config.notify_queue),
			None => Notifier::log_only(config.notify_queue),
		};

		let blocklist = Arc::new(IpBlocklistManager::new(store.clone(), notifier.clone()));
		let validator = Arc::new(LicenseValidator::new(
			config.clone(),
			store.clone(),
			blocklist.clone(),
			notifier.clone(),
		));
		let rate_limiter = Arc::new(RateLimitManager::new(
			config.clone(),
			store.clone(),
			blocklist.clone(),
			notifier.clone(),
		));

		Arc::new(Self {
			config,
			store,
			notifier,
			scheduler: Scheduler::new(),
			blocklist,
			validator,
			rate_limiter,
		})
	}

	/// Register and start the background maintenance tasks.
	pub fn start_background(app: &App) {
		app.scheduler.every(
			Duration::from_secs(app.config.sweep_interval_secs),
			Arc::new(BlocklistSweepTask),
		);
		app.scheduler.start(app.clone());
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState").field("config", &self.config).finish()
	}
}

// vim: ts=4
