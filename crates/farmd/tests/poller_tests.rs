//! Telemetry poller tests: single-flight, backoff, history admission.
//!
//! The device is a scripted in-process fake; no network is used.

mod common;

use common::{dashboard, fast_config, student, ScriptedDevice, Step, ALL_OFF, GOOD_READING};
use farm_common::{DashboardEvent, FetchError, LinkPhase};
use farmd::{PollOutcome, PollScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};

/// Wait for the first event matching `pred`
async fn wait_for<F>(rx: &mut broadcast::Receiver<DashboardEvent>, pred: F) -> DashboardEvent
where
    F: Fn(&DashboardEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// ============================================================================
// Normalization end to end
// ============================================================================

#[tokio::test]
async fn test_reading_is_normalized_and_passed_through() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Body(GOOD_READING));
    device.push("status", Step::Body(ALL_OFF));
    let dash = dashboard(&device, fast_config(), student()).await;

    let outcome = dash.poller.poll_once().await;
    let PollOutcome::Updated(sample) = outcome else {
        panic!("expected update, got {:?}", outcome);
    };

    // (2048/4095)^0.6 * 100 = 65.99, snapped to the 70 bucket
    assert_eq!(sample.light, 70.0);
    assert_eq!(sample.temperature, 25.0);
    assert_eq!(sample.humidity, 60.0);
    assert_eq!(sample.steam, 10.0);
    assert_eq!(sample.soil_moisture, 40.0);
    assert_eq!(sample.water_level, 80.0);
}

#[tokio::test]
async fn test_success_triggers_one_actuator_refresh() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Body(GOOD_READING));
    device.push("status", Step::Body(ALL_OFF));
    let dash = dashboard(&device, fast_config(), student()).await;
    let mut rx = dash.subscribe();

    dash.poller.poll_once().await;
    wait_for(&mut rx, |e| matches!(e, DashboardEvent::ActuatorsUpdated { .. })).await;

    assert_eq!(device.hits("status"), 1);
    assert!(!dash.poller.actuators().status().await.is_empty());
}

#[tokio::test]
async fn test_actuator_refresh_failure_does_not_touch_connection() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Body(GOOD_READING));
    device.push("status", Step::Status(500));
    let dash = dashboard(&device, fast_config(), student()).await;

    dash.poller.poll_once().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(device.hits("status"), 1);
    let conn = dash.poller.connection().await;
    assert!(conn.connected);
    assert_eq!(conn.phase, LinkPhase::Healthy);
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test]
async fn test_concurrent_poll_is_a_noop() {
    let device = ScriptedDevice::new();
    let gate = Arc::new(Notify::new());
    device.push("sensors", Step::Gated(gate.clone(), GOOD_READING));
    device.push("status", Step::Body(ALL_OFF));
    let mut config = fast_config();
    config.polling.sensor_timeout_ms = 2_000;
    let dash = dashboard(&device, config, student()).await;

    let poller = dash.poller.clone();
    let first = tokio::spawn(async move { poller.poll_once().await });

    while device.hits("sensors") == 0 {
        tokio::task::yield_now().await;
    }
    assert!(dash.poller.is_polling());

    assert_eq!(dash.poller.poll_once().await, PollOutcome::Skipped);
    assert_eq!(device.hits("sensors"), 1);

    gate.notify_one();
    assert!(matches!(first.await.unwrap(), PollOutcome::Updated(_)));
    assert!(!dash.poller.is_polling());
    assert_eq!(dash.poller.history().await.len(), 1);
}

#[tokio::test]
async fn test_guard_released_after_timeout() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Hang);
    let mut config = fast_config();
    config.polling.max_retries = 0;
    let dash = dashboard(&device, config, student()).await;

    let outcome = dash.poller.poll_once().await;
    assert_eq!(outcome, PollOutcome::Failed(FetchError::Timeout(40)));
    assert!(!dash.poller.is_polling());

    // Next tick goes through
    device.push("sensors", Step::Body(GOOD_READING));
    assert!(matches!(dash.poller.poll_once().await, PollOutcome::Updated(_)));
}

// ============================================================================
// Backoff
// ============================================================================

#[tokio::test]
async fn test_three_timeouts_then_success() {
    let device = ScriptedDevice::new();
    for _ in 0..3 {
        device.push("sensors", Step::Hang);
    }
    device.push("sensors", Step::Body(GOOD_READING));
    device.push("status", Step::Body(ALL_OFF));
    let dash = dashboard(&device, fast_config(), student()).await;
    let mut rx = dash.subscribe();

    // One external tick; the three retries are self-scheduled
    let first = dash.poller.poll_once().await;
    assert_eq!(first, PollOutcome::Failed(FetchError::Timeout(40)));

    let mut phases = Vec::new();
    let updated = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await.unwrap() {
                DashboardEvent::Error { connection, .. } => phases.push(connection.phase),
                e @ DashboardEvent::DataUpdated { .. } => return e,
                _ => {}
            }
        }
    })
    .await
    .expect("poller never recovered");

    assert_eq!(
        phases,
        vec![LinkPhase::Retrying(1), LinkPhase::Retrying(2), LinkPhase::Retrying(3)]
    );

    let DashboardEvent::DataUpdated { history, connection, .. } = updated else {
        unreachable!();
    };
    assert_eq!(history.len(), 1);
    assert!(connection.connected);
    assert_eq!(connection.retry_count, 0);
    assert_eq!(connection.backoff_delay_ms, 10);

    assert_eq!(device.hits("sensors"), 4);
    assert_eq!(dash.poller.history().await.len(), 1);
}

#[tokio::test]
async fn test_backoff_delay_doubles() {
    let device = ScriptedDevice::new();
    let dash = dashboard(&device, fast_config(), student()).await;
    let mut rx = dash.subscribe();

    dash.poller.poll_once().await;

    let mut delays = Vec::new();
    while delays.len() < 3 {
        if let DashboardEvent::Error { connection, .. } =
            wait_for(&mut rx, |e| matches!(e, DashboardEvent::Error { .. })).await
        {
            delays.push(connection.backoff_delay_ms);
        }
    }
    assert_eq!(delays, vec![10, 20, 40]);
}

#[tokio::test]
async fn test_failed_stops_self_scheduling() {
    let device = ScriptedDevice::new();
    let mut config = fast_config();
    config.polling.max_retries = 2;
    let dash = dashboard(&device, config, student()).await;
    let mut rx = dash.subscribe();

    dash.poller.poll_once().await;

    let event = wait_for(&mut rx, |e| {
        matches!(e, DashboardEvent::Error { connection, .. } if connection.phase == LinkPhase::Failed)
    })
    .await;
    if let DashboardEvent::Error { message, connection } = event {
        assert!(!connection.connected);
        assert_eq!(connection.retry_count, 2);
        assert!(message.contains("unreachable"), "{}", message);
    }

    // Initial attempt plus two retries, then silence
    assert_eq!(device.hits("sensors"), 3);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(device.hits("sensors"), 3);
    assert!(dash.poller.history().await.is_empty());
}

#[tokio::test]
async fn test_next_tick_after_failed_starts_over() {
    let device = ScriptedDevice::new();
    let mut config = fast_config();
    config.polling.max_retries = 0;
    let dash = dashboard(&device, config, student()).await;

    dash.poller.poll_once().await;
    assert_eq!(dash.poller.connection().await.phase, LinkPhase::Failed);

    device.push("sensors", Step::Body(GOOD_READING));
    dash.poller.poll_once().await;
    let conn = dash.poller.connection().await;
    assert_eq!(conn.phase, LinkPhase::Healthy);
    assert_eq!(conn.retry_count, 0);
}

/// Phase a failed fetch moves to from `prev`, for `max` retries
fn next_phase(prev: Option<LinkPhase>, max: u32) -> LinkPhase {
    match prev {
        None | Some(LinkPhase::Healthy) | Some(LinkPhase::Failed) => LinkPhase::Retrying(1),
        Some(LinkPhase::Retrying(n)) if n < max => LinkPhase::Retrying(n + 1),
        Some(LinkPhase::Retrying(_)) => LinkPhase::Failed,
    }
}

#[tokio::test]
async fn test_tick_during_backoff_does_not_stack_retries() {
    let device = ScriptedDevice::new();
    let mut config = fast_config();
    config.polling.base_delay_ms = 40;
    config.polling.max_retries = 3;
    let dash = dashboard(&device, config, student()).await;
    let mut rx = dash.subscribe();

    // Retrying(1) with a 40 ms timer pending
    dash.poller.poll_once().await;
    assert!(dash.poller.retry_pending());

    // A tick lands mid-backoff: it replaces the pending timer
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(dash.poller.poll_once().await, PollOutcome::Failed(_)));
    assert_eq!(dash.poller.connection().await.phase, LinkPhase::Retrying(2));

    wait_for(&mut rx, |e| {
        matches!(e, DashboardEvent::Error { connection, .. } if connection.phase == LinkPhase::Failed)
    })
    .await;
    assert_eq!(device.hits("sensors"), 4);

    // Nothing left armed once Failed is reached
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(device.hits("sensors"), 4);
    assert!(!dash.poller.retry_pending());
    assert_eq!(dash.poller.connection().await.phase, LinkPhase::Failed);
}

#[tokio::test]
async fn test_ticker_and_retries_share_one_backoff_sequence() {
    let device = ScriptedDevice::new();
    let mut config = fast_config();
    config.polling.base_delay_ms = 20;
    config.polling.max_retries = 2;
    let dash = dashboard(&device, config, student()).await;
    let mut rx = dash.subscribe();

    // Ticks land while retries are still pending
    let (stop_tx, stop_rx) = watch::channel(false);
    let ticker = PollScheduler::new(dash.poller.clone(), Duration::from_millis(50)).spawn(stop_rx);
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop_tx.send(true).unwrap();
    ticker.await.unwrap();

    // Let the last retry chain run out
    tokio::time::sleep(Duration::from_millis(250)).await;
    let settled = device.hits("sensors");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device.hits("sensors"), settled);
    assert!(!dash.poller.retry_pending());

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            DashboardEvent::Error { connection, .. } => phases.push(connection.phase),
            DashboardEvent::DataUpdated { .. } => panic!("device never answers"),
            _ => {}
        }
    }

    // One Error per fetch, and every fetch advanced the same counter
    assert_eq!(phases.len(), settled);
    let mut prev = None;
    for phase in &phases {
        assert_eq!(*phase, next_phase(prev, 2), "after {:?} in {:?}", prev, phases);
        prev = Some(*phase);
    }
    assert!(phases.contains(&LinkPhase::Failed));
    assert_eq!(phases.last(), Some(&LinkPhase::Failed));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_invalid_payloads_never_reach_history() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Body("{not json"));
    device.push(
        "sensors",
        Step::Body(r#"{"temperature":25,"humidity":null,"steam":10,"light":1,"soil":40,"water":80}"#),
    );
    device.push("sensors", Step::Body(r#"{"temperature":25}"#));
    let mut config = fast_config();
    config.polling.max_retries = 0;
    let dash = dashboard(&device, config, student()).await;

    assert!(matches!(
        dash.poller.poll_once().await,
        PollOutcome::Failed(FetchError::Decode(_))
    ));
    assert!(matches!(
        dash.poller.poll_once().await,
        PollOutcome::Failed(FetchError::Validation(_))
    ));
    assert!(matches!(
        dash.poller.poll_once().await,
        PollOutcome::Failed(FetchError::Validation(_))
    ));
    assert!(dash.poller.history().await.is_empty());
}

#[tokio::test]
async fn test_validation_failure_is_retried_like_transport_failure() {
    let device = ScriptedDevice::new();
    device.push("sensors", Step::Body(r#"{"temperature":"hot"}"#));
    device.push("sensors", Step::Body(GOOD_READING));
    device.push("status", Step::Body(ALL_OFF));
    let dash = dashboard(&device, fast_config(), student()).await;
    let mut rx = dash.subscribe();

    dash.poller.poll_once().await;
    wait_for(&mut rx, |e| matches!(e, DashboardEvent::DataUpdated { .. })).await;

    assert_eq!(device.hits("sensors"), 2);
    assert_eq!(dash.poller.history().await.len(), 1);
}

#[tokio::test]
async fn test_history_keeps_last_samples() {
    let device = ScriptedDevice::new();
    let mut config = fast_config();
    config.polling.history_capacity = 3;
    let dash = dashboard(&device, config, student()).await;

    let temps = [
        r#"{"temperature":1,"humidity":0,"steam":0,"light":0,"soil":0,"water":0}"#,
        r#"{"temperature":2,"humidity":0,"steam":0,"light":0,"soil":0,"water":0}"#,
        r#"{"temperature":3,"humidity":0,"steam":0,"light":0,"soil":0,"water":0}"#,
        r#"{"temperature":4,"humidity":0,"steam":0,"light":0,"soil":0,"water":0}"#,
        r#"{"temperature":5,"humidity":0,"steam":0,"light":0,"soil":0,"water":0}"#,
    ];
    for body in temps {
        device.push("sensors", Step::Body(body));
        dash.poller.poll_once().await;
    }

    let kept: Vec<f64> = dash
        .poller
        .history()
        .await
        .iter()
        .map(|s| s.temperature)
        .collect();
    assert_eq!(kept, vec![3.0, 4.0, 5.0]);
    assert_eq!(dash.poller.latest().await.map(|s| s.temperature), Some(5.0));
}
