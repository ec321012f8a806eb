//! Fixed-interval background task scheduler.
//!
//! Background maintenance (the blocklist sweep) runs here, decoupled from
//! the request path: each registered task gets its own tokio interval
//! timer, a failing tick is logged and never cancels the loop, and missed
//! ticks are delayed rather than bursted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::prelude::*;

/// A unit of periodic background work.
#[async_trait]
pub trait Task<S: Clone + Send + Sync + 'static>: Send + Sync {
	fn name(&self) -> &'static str;
	async fn run(&self, state: &S) -> GhResult<()>;
}

pub struct Scheduler<S: Clone + Send + Sync + 'static> {
	pending: Mutex<Vec<(Duration, Arc<dyn Task<S>>)>>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: Clone + Send + Sync + 'static> Scheduler<S> {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { pending: Mutex::new(Vec::new()), handles: Mutex::new(Vec::new()) })
	}

	/// Register a task to run every `interval`. Takes effect on `start`.
	pub fn every(&self, interval: Duration, task: Arc<dyn Task<S>>) {
		self.pending.lock().push((interval, task));
	}

	/// Spawn one timer loop per registered task.
	pub fn start(&self, state: S) {
		let pending: Vec<_> = self.pending.lock().drain(..).collect();
		let mut handles = self.handles.lock();

		for (interval, task) in pending {
			let state = state.clone();
			info!("Scheduling task '{}' every {:?}", task.name(), interval);

			handles.push(tokio::spawn(async move {
				let mut ticker = tokio::time::interval(interval);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
				// The first tick fires immediately; skip it so a freshly
				// started process doesn't sweep before serving.
				ticker.tick().await;

				loop {
					ticker.tick().await;
					if let Err(err) = task.run(&state).await {
						warn!("Task '{}' failed: {}", task.name(), err);
					}
				}
			}));
		}
	}

	/// Abort all running task loops.
	pub fn shutdown(&self) {
		for handle in self.handles.lock().drain(..) {
			handle.abort();
		}
	}
}

impl<S: Clone + Send + Sync + 'static> Drop for Scheduler<S> {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingTask {
		runs: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl Task<()> for CountingTask {
		fn name(&self) -> &'static str {
			"test.counting"
		}

		async fn run(&self, _state: &()) -> GhResult<()> {
			self.runs.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct FailingTask;

	#[async_trait]
	impl Task<()> for FailingTask {
		fn name(&self) -> &'static str {
			"test.failing"
		}

		async fn run(&self, _state: &()) -> GhResult<()> {
			Err(Error::DbError)
		}
	}

	#[tokio::test]
	async fn test_task_runs_repeatedly() {
		let runs = Arc::new(AtomicUsize::new(0));
		let scheduler = Scheduler::new();
		scheduler.every(Duration::from_millis(20), Arc::new(CountingTask { runs: runs.clone() }));
		scheduler.start(());

		tokio::time::sleep(Duration::from_millis(250)).await;
		scheduler.shutdown();

		assert!(runs.load(Ordering::SeqCst) >= 2);
	}

	#[tokio::test]
	async fn test_failing_task_does_not_stop_the_loop() {
		let runs = Arc::new(AtomicUsize::new(0));
		let scheduler = Scheduler::new();
		scheduler.every(Duration::from_millis(20), Arc::new(FailingTask));
		scheduler.every(Duration::from_millis(20), Arc::new(CountingTask { runs: runs.clone() }));
		scheduler.start(());

		tokio::time::sleep(Duration::from_millis(250)).await;
		scheduler.shutdown();

		// The failing sibling never prevents other tasks from running
		assert!(runs.load(Ordering::SeqCst) >= 2);
	}
}

// vim: ts=4
