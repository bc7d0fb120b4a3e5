//! iotd - Hierarchical IoT Device Registry
//!
//! CLI entry point for running the registry and its demo workload.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use rand::Rng;
use tracing::{debug, info, warn};

use iotd::cli::{Cli, Command, OutputFormat, get_log_path};
use iotd::config::Config;
use iotd::events::spawn_event_logger;
use iotd::query::{QueryResult, ReadingStatus};
use iotd::supervisor::Supervisor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run => cmd_run(&config).await,
        Command::Demo {
            groups,
            devices,
            empty,
            timeout_ms,
            format,
        } => cmd_demo(&config, groups, devices, empty, timeout_ms.map(Duration::from_millis), format).await,
    }
}

/// Run the registry until Ctrl-C
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let supervisor = Supervisor::start(config);

    let logger = match &config.events.log_path {
        Some(path) => {
            let handle = spawn_event_logger(&supervisor.events(), path)?;
            println!("Writing events to {}", path.display());
            Some(handle)
        }
        None => None,
    };

    println!("iotd running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("cmd_run: received Ctrl-C");

    supervisor.shutdown().await?;
    if let Some(logger) = logger {
        logger.abort();
    }
    println!("iotd stopped");
    Ok(())
}

/// Register devices across groups, record random readings, and query each group
async fn cmd_demo(
    config: &Config,
    groups: usize,
    devices: usize,
    empty: usize,
    timeout: Option<Duration>,
    format: OutputFormat,
) -> Result<()> {
    debug!(groups, devices, empty, ?timeout, ?format, "cmd_demo: called");
    let supervisor = Supervisor::start(config);
    let manager = supervisor.manager().clone();

    let mut request_id = 0;
    let mut results = BTreeMap::new();
    for g in 0..groups {
        let group_id = format!("group-{}", g);
        for d in 0..devices {
            let device = manager.track_device(&group_id, &format!("device-{}", d)).await?;
            if d >= empty {
                let value = rand::rng().random_range(15.0..30.0);
                request_id += 1;
                device.record(request_id, value, config.manager.ask_timeout()).await?;
            }
        }

        request_id += 1;
        let result = manager.query_all(request_id, &group_id, timeout).await?;
        results.insert(group_id, result);
    }

    if let Err(e) = supervisor.shutdown().await {
        warn!(error = %e, "cmd_demo: shutdown incomplete");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => print_results(&results),
    }
    Ok(())
}

fn print_results(results: &BTreeMap<String, QueryResult>) {
    for (group_id, result) in results {
        println!("{} (request {})", group_id.bold(), result.request_id);
        if result.statuses.is_empty() {
            println!("  {}", "no devices".dimmed());
        }
        for (device_id, status) in &result.statuses {
            let rendered = match status {
                ReadingStatus::Value(value) => format!("{:.1}", value).green(),
                ReadingStatus::Empty => "empty".yellow(),
                ReadingStatus::Unavailable => "unavailable".red(),
                ReadingStatus::TimedOut => "timed out".red(),
            };
            println!("  {:<12} {}", device_id, rendered);
        }
    }
}
