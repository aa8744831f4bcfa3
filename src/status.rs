use std::{
	sync::{Condvar, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use bitblt_blade_shared::INITIAL_STATUS_ID;
use serde::Serialize;
use tracing::debug;

use crate::Result;

/// The latest user visible state change.
///
/// Serializes as `{"status": ..., "status_id": ...}`, the shape long-poll clients read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
	#[serde(rename = "status_id")]
	pub id: u64,
	#[serde(rename = "status")]
	pub text: String,
}

impl StatusEvent {
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}
}

/// Holds only the most recent event; waiters observe the latest id, never a queue.
#[derive(Debug)]
pub struct StatusBroadcaster {
	current: Mutex<StatusEvent>,
	changed: Condvar,
}

impl Default for StatusBroadcaster {
	fn default() -> Self {
		Self::new()
	}
}

impl StatusBroadcaster {
	pub fn new() -> Self {
		Self {
			current: Mutex::new(StatusEvent {
				id: INITIAL_STATUS_ID,
				text: String::new(),
			}),
			changed: Condvar::new(),
		}
	}

	fn lock(&self) -> MutexGuard<'_, StatusEvent> {
		// the event is replaced whole, so a poisoned value is still consistent
		self.current.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Replaces the current message, bumps the id and wakes every waiter.
	pub fn publish(&self, text: impl Into<String>) -> u64 {
		let text = text.into();
		let id = {
			let mut current = self.lock();
			current.id += 1;
			current.text = text;
			debug!(id = current.id, status = %current.text, "status published");
			current.id
		};
		self.changed.notify_all();
		id
	}

	pub fn current(&self) -> StatusEvent {
		self.lock().clone()
	}

	pub fn current_id(&self) -> u64 {
		self.lock().id
	}

	/// Returns as soon as the current id differs from `last_seen`.
	///
	/// Blocks without bound while nothing is published.
	pub fn wait_for_change(&self, last_seen: u64) -> StatusEvent {
		let guard = self.lock();
		let guard = self
			.changed
			.wait_while(guard, |current| current.id == last_seen)
			.unwrap_or_else(PoisonError::into_inner);
		guard.clone()
	}

	/// Like [`wait_for_change`](Self::wait_for_change), but gives up after `timeout`.
	pub fn wait_for_change_timeout(&self, last_seen: u64, timeout: Duration) -> Option<StatusEvent> {
		let guard = self.lock();
		let (guard, result) = self
			.changed
			.wait_timeout_while(guard, timeout, |current| current.id == last_seen)
			.unwrap_or_else(PoisonError::into_inner);

		if result.timed_out() {
			None
		} else {
			Some(guard.clone())
		}
	}
}
