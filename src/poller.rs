//! External-change poll loop
//!
//! Another application, the OS or the user's display settings can change the
//! mode without going through the tray. A dedicated thread re-reads the
//! display at a fixed interval and lets the coordinator reconcile any
//! difference. Read failures skip the tick; the loop runs for the life of
//! the process.

use crate::coordinator::{Coordinator, PollOutcome};
use crate::display::DisplayBackend;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Spawn the poll loop thread
pub fn spawn_poll_loop<D>(
    coordinator: Arc<Coordinator<D>>,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>>
where
    D: DisplayBackend + 'static,
{
    thread::Builder::new()
        .name("display-poller".to_string())
        .spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "display poll loop started");
            loop {
                thread::sleep(interval);
                log_outcome(coordinator.poll_tick());
            }
        })
}

fn log_outcome(outcome: PollOutcome) {
    match outcome {
        PollOutcome::Unchanged => {}
        PollOutcome::Reconciled(state) => debug!(display = %state, "menu updated from poll"),
        PollOutcome::ReadFailed => debug!("poll tick skipped"),
    }
}
