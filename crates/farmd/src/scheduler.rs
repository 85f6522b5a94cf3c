//! Poll Scheduler - fixed wall-clock ticker driving the poller.
//!
//! Every tick fires a poll without waiting for the previous one; slow polls
//! are absorbed by the poller's single-flight guard.

use crate::poller::{PollOutcome, TelemetryPoller};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub struct PollScheduler {
    poller: TelemetryPoller,
    period: Duration,
}

impl PollScheduler {
    pub fn new(poller: TelemetryPoller, period: Duration) -> Self {
        Self { poller, period }
    }

    /// Start ticking until `shutdown` flips to true or its sender is dropped
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Poll scheduler started (interval: {} ms)", self.period.as_millis());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let poller = self.poller.clone();
                        tokio::spawn(async move {
                            if poller.poll_once().await == PollOutcome::Skipped {
                                debug!("Tick dropped, previous poll still running");
                            }
                        });
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Poll scheduler stopped");
        })
    }
}
