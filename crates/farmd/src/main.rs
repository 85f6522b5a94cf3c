//! farmd - Smart Farm dashboard daemon and CLI
//!
//! Polls the greenhouse controller, prints readings, sends actuator commands.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use farm_common::{AccessControl, DashboardEvent, LogFilter, VERSION};
use farmd::config::{Config, DEFAULT_CONFIG_PATH};
use farmd::{render, Dashboard, Delivery, Fetcher, PollOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "farmd")]
#[command(about = "Smart Farm - greenhouse telemetry and actuator control", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: /etc/farmd/config.toml, then /var/lib/farmd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the device base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the device continuously and print readings
    Run {
        /// Print the chart of the session on exit
        #[arg(long)]
        chart: bool,
    },

    /// Send one actuator command (LED_ON, LED_OFF, FAN_ON, FAN_OFF, FEED, WATER)
    Send { cmd: String },

    /// Show the audit log
    Logs {
        /// all, commands or errors
        #[arg(long, default_value = "all")]
        filter: LogFilter,

        /// Only entries from this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Poll once and show readings and actuator state
    Status,

    /// Write a default config file
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        Config::save_default(path)?;
        println!("[OK] Wrote {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };
    if let Some(url) = cli.base_url {
        config.device.base_url = url;
    }

    let access: Arc<dyn AccessControl> = Arc::new(config.session.to_session());
    let dashboard = Dashboard::build(config, Fetcher::http()?, access).await?;

    match cli.command {
        Commands::Run { chart } => run(&dashboard, chart).await,
        Commands::Send { cmd } => send(&dashboard, &cmd).await,
        Commands::Logs { filter, date } => logs(&dashboard, filter, date).await,
        Commands::Status => status(&dashboard).await,
        Commands::Init { .. } => Ok(()),
    }
}

async fn run(dashboard: &Dashboard, chart: bool) -> Result<()> {
    info!("farmd v{} starting", VERSION);

    let console = render::spawn_console(dashboard.subscribe());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = dashboard.start(shutdown_rx).await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down gracefully");

    let _ = shutdown_tx.send(true);
    ticker.await?;
    console.abort();

    if chart {
        render::print_chart(&dashboard.poller.chart_series().await);
    }
    Ok(())
}

async fn send(dashboard: &Dashboard, cmd: &str) -> Result<()> {
    let mut events = dashboard.subscribe();

    match dashboard.dispatcher.send_command(cmd).await? {
        Delivery::Delivered { attempts } => {
            println!("[OK] {} delivered after {} attempt(s)", cmd, attempts);
            // Wait briefly for the post-command status refresh
            let deadline = dashboard.config().actuators.status_timeout() + Duration::from_millis(200);
            let refreshed = tokio::time::timeout(deadline, async {
                loop {
                    match events.recv().await {
                        Ok(DashboardEvent::ActuatorsUpdated { status }) => return Some(status),
                        Ok(_) => continue,
                        Err(_) => return None,
                    }
                }
            })
            .await
            .ok()
            .flatten();
            if let Some(status) = refreshed {
                render::print_actuators(&status);
            }
            Ok(())
        }
        Delivery::Failed { attempts } => {
            bail!("{} not delivered after {} attempts, see `farmd logs --filter errors`", cmd, attempts)
        }
    }
}

async fn logs(dashboard: &Dashboard, filter: LogFilter, date: Option<String>) -> Result<()> {
    if let Some(day) = &date {
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", day))?;
    }
    if dashboard.audit.path().is_none() {
        println!("[NOTE] Audit trail is not persisted, showing this process only");
    }

    let entries = dashboard.audit.filtered(filter, date.as_deref()).await;
    render::print_audit(&entries);
    Ok(())
}

async fn status(dashboard: &Dashboard) -> Result<()> {
    match dashboard.poller.poll_once().await {
        PollOutcome::Updated(sample) => {
            for line in render::format_sample(&sample) {
                println!("  {}", line);
            }
        }
        PollOutcome::Failed(e) => println!("[ERROR] Sensors unavailable: {}", e),
        PollOutcome::Skipped => {}
    }

    match dashboard.poller.actuators().refresh().await {
        Ok(status) => render::print_actuators(&status),
        Err(e) => println!("[ERROR] Actuator status unavailable: {}", e),
    }
    Ok(())
}
