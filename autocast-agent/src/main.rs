//! autocast-agent - Scheduler daemon for marketing cycles
//!
//! Sweeps all projects and runs the ones that are due, or drives a single
//! project on a fixed interval.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use libautocast::logging::LoggingConfig;
use libautocast::{AutocastError, AutocastService, Config};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "autocast-agent")]
#[command(version)]
#[command(about = "Scheduler daemon that runs marketing cycles for due projects")]
#[command(long_about = "\
autocast-agent - Scheduler daemon for marketing cycles

DESCRIPTION:
    Without a project id the agent checks every project once per poll
    interval and runs a cycle for each one whose frequency has elapsed
    since its last run.

    With a project id the agent runs that project immediately and then
    once per poll interval, ignoring the project's frequency.

USAGE:
    # Global mode
    autocast-agent

    # Dedicated mode, every 30 minutes
    autocast-agent 3f2c... --poll-interval 30m

    # Single sweep, then exit
    autocast-agent --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the running cycle)

CONFIGURATION:
    Configuration file: ~/.config/autocast/config.toml (or $AUTOCAST_CONFIG)

    [scheduler]
    poll_interval = \"15m\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
    3 - Invalid arguments
")]
struct Cli {
    /// Run only this project (dedicated mode)
    project_id: Option<String>,

    /// How often to sweep, e.g. 15m or 1h (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Perform a single sweep (or single run in dedicated mode) and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<AutocastError>()
                .map(AutocastError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.poll_interval.is_some_and(|d| d.is_zero()) {
        return Err(AutocastError::InvalidInput("--poll-interval must be greater than zero".to_string()).into());
    }

    let config = Config::load().context("loading configuration")?;
    let service = AutocastService::from_config(config).await?;
    let scheduler = service.scheduler(cli.poll_interval)?;

    info!("autocast-agent starting");

    if cli.once {
        match &cli.project_id {
            Some(project_id) => {
                let result = service.trigger_cycle(project_id).await;
                info!("Cycle for {} finished with {} errors", project_id, result.errors.len());
            }
            None => {
                let results = scheduler.sweep_once(Utc::now()).await?;
                info!("Sweep ran {} cycles", results.len());
            }
        }
        return Ok(());
    }

    setup_signal_handlers(scheduler.shutdown_handle())?;

    match &cli.project_id {
        Some(project_id) => scheduler.run_dedicated(project_id).await,
        None => scheduler.run_global().await,
    }

    info!("autocast-agent stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::sync::atomic::Ordering;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, stopping after the current cycle", sig);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    Ok(())
}
