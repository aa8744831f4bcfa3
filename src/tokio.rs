//! Long-poll helpers for async servers.
//!
//! Waiting on the broadcaster parks a thread, so the wait runs on tokio's blocking pool
//! instead of a runtime worker.

use std::{sync::Arc, time::Duration};

use tokio::task;
use tracing::debug;

use crate::{Result, StatusBroadcaster, StatusEvent};

/// Resolves once the status id differs from `last_seen`.
pub async fn wait_for_change(status: Arc<StatusBroadcaster>, last_seen: u64) -> Result<StatusEvent> {
	let event = task::spawn_blocking(move || status.wait_for_change(last_seen)).await?;
	Ok(event)
}

/// Resolves with `None` if nothing was published within `timeout`.
///
/// Dropping the returned future before it resolves does not stop the blocking wait; it
/// ends on its own when the timeout elapses.
pub async fn wait_for_change_timeout(
	status: Arc<StatusBroadcaster>,
	last_seen: u64,
	timeout: Duration,
) -> Result<Option<StatusEvent>> {
	let event =
		task::spawn_blocking(move || status.wait_for_change_timeout(last_seen, timeout)).await?;
	if event.is_none() {
		debug!(last_seen, ?timeout, "long-poll timed out");
	}
	Ok(event)
}
