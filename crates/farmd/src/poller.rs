//! Telemetry Poller - one sensor fetch cycle with single-flight and backoff.
//!
//! Invoked by the external ticker and by its own retry timer. Both paths go
//! through the same `in_flight` guard, so at most one `/sensors` request is
//! outstanding at any time. At most one retry timer is pending: a cycle
//! started by the ticker cancels it, and a timer that fires after being
//! superseded does nothing.

use crate::actuators::ActuatorMonitor;
use crate::fetcher::Fetcher;
use farm_common::chart::{self, ChartSeries};
use farm_common::{
    BoundedHistory, ConnectionSnapshot, ConnectionState, DashboardEvent, FetchError,
    LinkPhase, RawReading, RetryPolicy, SensorSample,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a single `poll_once` call did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Another poll was in flight, or the retry timer was superseded
    Skipped,
    /// Sample admitted to history
    Updated(SensorSample),
    /// Fetch or validation failed; connection state advanced
    Failed(FetchError),
}

/// Sensor poller, cheap to clone and shared between the ticker, the retry
/// timer and any presentation task
#[derive(Clone)]
pub struct TelemetryPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    fetcher: Fetcher,
    sensors_url: String,
    attempt_timeout: Duration,
    in_flight: AtomicBool,
    retry: SyncMutex<RetrySlot>,
    history: RwLock<BoundedHistory>,
    connection: Mutex<ConnectionState>,
    actuators: Arc<ActuatorMonitor>,
    events: broadcast::Sender<DashboardEvent>,
}

/// The single pending retry timer. `generation` changes whenever the pending
/// timer is replaced or cancelled.
#[derive(Default)]
struct RetrySlot {
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl RetrySlot {
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Clears the in-flight flag on every exit path
struct PollGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

impl TelemetryPoller {
    pub fn new(
        fetcher: Fetcher,
        sensors_url: String,
        policy: RetryPolicy,
        history_capacity: usize,
        actuators: Arc<ActuatorMonitor>,
        events: broadcast::Sender<DashboardEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                fetcher,
                sensors_url,
                attempt_timeout: policy.attempt_timeout,
                in_flight: AtomicBool::new(false),
                retry: SyncMutex::new(RetrySlot::default()),
                history: RwLock::new(BoundedHistory::new(history_capacity)),
                connection: Mutex::new(ConnectionState::new(policy)),
                actuators,
                events,
            }),
        }
    }

    /// Run one fetch cycle unless one is already running.
    ///
    /// This is the external entry point: a pending retry timer is cancelled,
    /// and this cycle decides whether a new one is armed.
    pub async fn poll_once(&self) -> PollOutcome {
        let Some(guard) = self.try_begin() else {
            debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        };
        self.retry_slot().cancel();

        self.cycle(guard).await
    }

    /// Cycle started by the retry timer armed under `generation`
    async fn poll_retry(&self, generation: u64) -> PollOutcome {
        let guard = loop {
            if let Some(guard) = self.try_begin() {
                break guard;
            }
            // The arming cycle may still be releasing the guard
            let superseded = self.retry_slot().generation != generation;
            if superseded {
                return PollOutcome::Skipped;
            }
            tokio::task::yield_now().await;
        };

        {
            let mut slot = self.retry_slot();
            if slot.generation != generation {
                debug!("Retry timer superseded, skipping");
                return PollOutcome::Skipped;
            }
            // This task is the timer; detach it instead of aborting itself
            slot.timer = None;
        }

        self.cycle(guard).await
    }

    async fn cycle(&self, guard: PollGuard<'_>) -> PollOutcome {
        let (outcome, retry) = self.run_cycle().await;

        // Armed while the guard is held so no other cycle can slip in between
        if let Some(delay) = retry {
            self.schedule_retry(delay);
        }
        drop(guard);
        outcome
    }

    /// Whether a self-scheduled retry is waiting to fire
    pub fn retry_pending(&self) -> bool {
        self.retry_slot()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    pub fn is_polling(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.events.subscribe()
    }

    pub fn actuators(&self) -> &Arc<ActuatorMonitor> {
        &self.inner.actuators
    }

    /// Chronological copy of the history
    pub async fn history(&self) -> Vec<SensorSample> {
        self.inner.history.read().await.snapshot()
    }

    pub async fn latest(&self) -> Option<SensorSample> {
        self.inner.history.read().await.latest().copied()
    }

    /// Chart-ready series for every field
    pub async fn chart_series(&self) -> Vec<ChartSeries> {
        chart::all_series(&*self.inner.history.read().await)
    }

    pub async fn connection(&self) -> ConnectionSnapshot {
        self.inner.connection.lock().await.snapshot()
    }

    fn retry_slot(&self) -> MutexGuard<'_, RetrySlot> {
        self.inner
            .retry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_begin(&self) -> Option<PollGuard<'_>> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PollGuard {
                in_flight: &self.inner.in_flight,
            })
    }

    async fn run_cycle(&self) -> (PollOutcome, Option<Duration>) {
        if self.inner.history.read().await.is_empty() {
            self.emit(DashboardEvent::Loading);
        }

        match self.fetch_sample().await {
            Ok(sample) => {
                self.admit(sample).await;
                (PollOutcome::Updated(sample), None)
            }
            Err(e) => {
                let retry = self.record_failure(&e).await;
                (PollOutcome::Failed(e), retry)
            }
        }
    }

    async fn fetch_sample(&self) -> Result<SensorSample, FetchError> {
        let body = self
            .inner
            .fetcher
            .fetch_json(&self.inner.sensors_url, self.inner.attempt_timeout)
            .await?;
        let raw = RawReading::from_json(body)?;
        SensorSample::from_raw(&raw)
    }

    async fn admit(&self, sample: SensorSample) {
        let history = {
            let mut history = self.inner.history.write().await;
            history.append(sample);
            history.snapshot()
        };

        let connection = {
            let mut conn = self.inner.connection.lock().await;
            if conn.phase() != LinkPhase::Healthy {
                info!("Device reachable again after {}", conn.phase());
            }
            conn.record_success();
            conn.snapshot()
        };

        self.inner.actuators.spawn_refresh();

        self.emit(DashboardEvent::DataUpdated {
            sample,
            history,
            connection,
        });
    }

    /// Advance the backoff machine; returns the delay of the retry to arm
    async fn record_failure(&self, err: &FetchError) -> Option<Duration> {
        let (message, connection, retry) = {
            let mut conn = self.inner.connection.lock().await;
            conn.record_failure();
            (conn.advisory_message(), conn.snapshot(), conn.pending_retry())
        };

        warn!("Sensor poll failed ({}): {}. {}", err.as_str(), err, message);

        self.emit(DashboardEvent::Error {
            message: format!("{} ({})", message, err),
            connection,
        });
        retry
    }

    fn schedule_retry(&self, delay: Duration) {
        let mut slot = self.retry_slot();
        slot.cancel();
        let generation = slot.generation;

        debug!("Retry armed in {} ms", delay.as_millis());
        let poller = self.clone();
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            poller.poll_retry(generation).await;
        }));
    }

    fn emit(&self, event: DashboardEvent) {
        // Nobody listening is not an error
        let _ = self.inner.events.send(event);
    }
}
