//! Display Refresh Driver
//!
//! Periodically calls [`TimerService::tick`] so subscribers see elapsed time
//! advance. The interval only exists while the timer is running; in any other
//! status the task parks on the status channel until the next transition.
//! Ticks never accumulate time, they only re-read the clock.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::models::TimerStatus;
use crate::services::timer_service::TimerService;

/// Handle to the background refresh task; dropping it stops the task
#[derive(Debug)]
pub struct DisplayRefresher {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl DisplayRefresher {
    /// Spawn the refresh loop on the current tokio runtime
    pub fn spawn(timer: TimerService, interval: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_display_refresh(timer, interval, shutdown_rx));

        info!(interval_ms = interval.as_millis(), "Display refresh started");

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                debug!(error = %e, "Display refresh task ended abnormally");
            }
        }
    }
}

impl Drop for DisplayRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Refresh loop: tick while running, park otherwise, exit on shutdown
pub async fn run_display_refresh(
    timer: TimerService,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut statuses = timer.subscribe_status();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let status = *statuses.borrow_and_update();
        if status != TimerStatus::Running {
            debug!(status = %status, "Display refresh suspended");
            tokio::select! {
                changed = statuses.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
            continue;
        }

        debug!("Display refresh active");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    timer.tick();
                }
                changed = statuses.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *statuses.borrow() != TimerStatus::Running {
                        break;
                    }
                }
                _ = shutdown.changed() => return,
            }
        }
    }

    debug!("Display refresh stopped");
}
