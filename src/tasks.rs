//! Registry of long running tasks
//!
//! A restart should wait for songs and games to end, so every such activity registers itself
//! here while it runs.

use std::{
	collections::HashSet,
	sync::{Mutex, PoisonError},
	time::Duration,
};
use tokio::sync::watch;

/// The running tasks and whether there are none
#[derive(Debug)]
pub(crate) struct Tasks {
	/// Task names with the id of what they run for, usually a guild
	running: Mutex<HashSet<(&'static str, u64)>>,
	/// `true` when no task is running
	clear: watch::Sender<bool>,
}

impl Default for Tasks {
	fn default() -> Self {
		let (clear, _) = watch::channel(true);

		Self {
			running: Mutex::default(),
			clear,
		}
	}
}

impl Tasks {
	/// Register a task, returns `false` if it was already running
	pub(crate) fn start(&self, name: &'static str, id: u64) -> bool {
		let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

		if !running.insert((name, id)) {
			tracing::warn!(task = name, id, "task already exists");
			return false;
		}

		tracing::info!(task = name, id, "started task");

		if running.len() == 1 {
			self.clear.send_replace(false);
		}

		true
	}

	/// Whether the task is running
	pub(crate) fn has(&self, name: &'static str, id: u64) -> bool {
		self.running
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.contains(&(name, id))
	}

	/// Unregister a task, returns `false` if it was not running
	pub(crate) fn end(&self, name: &'static str, id: u64) -> bool {
		let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

		if !running.remove(&(name, id)) {
			tracing::warn!(task = name, id, "task doesn't exist");
			return false;
		}

		tracing::info!(task = name, id, "ended task");

		if running.is_empty() {
			self.clear.send_replace(true);
		}

		true
	}

	/// Number of running tasks
	pub(crate) fn count(&self) -> usize {
		self.running
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	/// Wait until no task is running, returns `false` if the timeout elapsed first
	pub(crate) async fn wait_until_clear(&self, timeout: Duration) -> bool {
		let mut clear = self.clear.subscribe();

		let cleared = tokio::time::timeout(timeout, clear.wait_for(|clear| *clear))
			.await
			.is_ok();
		cleared
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[test]
	fn start_and_end_are_idempotent_and_tracked() {
		let tasks = Tasks::default();

		assert!(tasks.start("music", 1));
		assert!(!tasks.start("music", 1));
		assert!(tasks.start("songguess", 1));
		assert!(tasks.has("music", 1));
		assert_eq!(tasks.count(), 2);

		assert!(tasks.end("music", 1));
		assert!(!tasks.end("music", 1));
		assert!(!tasks.has("music", 1));
		assert_eq!(tasks.count(), 1);
	}

	#[tokio::test]
	async fn waits_for_the_last_task() {
		let tasks = Arc::new(Tasks::default());
		assert!(tasks.wait_until_clear(Duration::from_millis(10)).await);

		tasks.start("music", 9);
		assert!(!tasks.wait_until_clear(Duration::from_millis(10)).await);

		let ender = Arc::clone(&tasks);
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			ender.end("music", 9);
		});

		assert!(tasks.wait_until_clear(Duration::from_secs(5)).await);
	}
}
