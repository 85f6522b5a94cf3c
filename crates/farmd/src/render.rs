//! Console output - ASCII-only rendering of dashboard events

use farm_common::chart::ChartSeries;
use farm_common::{
    ActuatorKey, ActuatorStatus, AuditEntry, ConnectionSnapshot, DashboardEvent, LinkPhase,
    Outcome, SampleField, SensorSample,
};
use owo_colors::OwoColorize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

const SEPARATOR: &str = "----------------------------------------";

/// Sparkline glyphs from low to high
const SPARK: &[char] = &['_', '.', '-', '~', '=', '*', '#'];

/// One reading per line, with its unit
pub fn format_sample(sample: &SensorSample) -> Vec<String> {
    SampleField::ALL
        .iter()
        .map(|f| format!("{:<14} {:>6.1} {}", f.as_str(), sample.get(*f), f.unit()))
        .collect()
}

/// Connection indicator
pub fn connection_badge(conn: &ConnectionSnapshot) -> String {
    match conn.phase {
        LinkPhase::Healthy if !conn.connected => "[CONNECTING]".dimmed().to_string(),
        LinkPhase::Healthy => "[ONLINE]".bright_green().to_string(),
        LinkPhase::Retrying(n) => format!("[RETRY {}]", n).yellow().to_string(),
        LinkPhase::Failed => "[OFFLINE]".bright_red().to_string(),
    }
}

/// Compact one-line curve of a chart series
pub fn sparkline(series: &ChartSeries) -> String {
    let top = (SPARK.len() - 1) as f64;
    series
        .points
        .iter()
        .map(|p| SPARK[(p.y * top).round() as usize])
        .collect()
}

pub fn print_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::Loading => println!("[INFO] {}", "Waiting for first reading...".dimmed()),
        DashboardEvent::DataUpdated {
            sample,
            history,
            connection,
        } => {
            println!("{}", SEPARATOR.dimmed());
            println!("{}  {} samples", connection_badge(connection), history.len());
            for line in format_sample(sample) {
                println!("  {}", line);
            }
        }
        DashboardEvent::Error {
            message,
            connection,
        } => {
            println!("{}  {}", connection_badge(connection), message.yellow());
        }
        DashboardEvent::ActuatorsUpdated { status } => print_actuators(status),
    }
}

pub fn print_actuators(status: &ActuatorStatus) {
    if status.is_empty() {
        println!("[ACTUATORS] {}", "unknown".dimmed());
        return;
    }
    let parts: Vec<String> = status
        .iter()
        .map(|(key, active)| actuator_label(key, active))
        .collect();
    println!("[ACTUATORS] {}", parts.join("  "));
}

fn actuator_label(key: ActuatorKey, active: bool) -> String {
    let label = key.state_label(active);
    if active {
        format!("{}={}", key, label.bright_green())
    } else {
        format!("{}={}", key, label.dimmed())
    }
}

pub fn print_chart(series: &[ChartSeries]) {
    println!("[CHART] 0-100, oldest to newest");
    for s in series {
        println!("  {:<14} {:<8} {}", s.field.as_str(), s.color, sparkline(s));
    }
}

pub fn print_audit(entries: &[AuditEntry]) {
    if entries.is_empty() {
        println!("[INFO] No audit entries");
        return;
    }
    for entry in entries {
        let outcome = match entry.outcome {
            Outcome::Success => entry.outcome.as_str().green().to_string(),
            Outcome::Failure => entry.outcome.as_str().red().to_string(),
        };
        println!(
            "{}  {:<14} {:<22} {}",
            entry.display_timestamp(),
            entry.actor,
            entry.action,
            outcome
        );
    }
}

/// Print every event until the channel closes
pub fn spawn_console(mut events: broadcast::Receiver<DashboardEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Console fell behind, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
