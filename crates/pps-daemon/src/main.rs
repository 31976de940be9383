//! PPS syntonization daemon entry point.
//!
//! Wires the discipline engine to a hardware backend, handles Unix
//! signals, and emits per-firing telemetry.

mod signals;
mod telemetry;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pps_common::{BackendKind, DisciplineConfig};
use pps_core::Discipline;
use pps_hal::{BenchParams, SimulatedBench};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::signals::SignalHandler;
use crate::telemetry::{
    format_csv_line, format_text_metrics, TelemetryCollector, TelemetryState, CSV_HEADER,
};

/// Syntonization daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "pps-daemon",
    about = "PPS syntonization daemon - disciplines a synthesized 1 Hz heartbeat to a reference pulse",
    version,
    long_about = None
)]
struct Args {
    /// Path to a runtime configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run against the simulated bench (overrides config file).
    #[arg(long, short = 's')]
    simulated: bool,

    /// Maximum seconds of bench time to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_seconds: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting PPS daemon");

    let mut config = load_config(&args)?;
    if args.simulated {
        config.backend = BackendKind::Simulated;
    }
    config
        .validate()
        .context("Configuration failed validation")?;

    info!(
        ?config.backend,
        nominal_secondary_hz = config.nominal_secondary_hz,
        warmup_edges = config.warmup_edge_count,
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run_daemon(&config, &signal_handler, args.max_seconds)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "pps_daemon={},pps_core={},pps_hal={},pps_common={}",
        level, level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PPS_CONFIG_PATH` environment variable
/// 3. `/etc/ppsd/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<DisciplineConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return DisciplineConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    if let Ok(env_path) = std::env::var("PPS_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from PPS_CONFIG_PATH");
            return DisciplineConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from PPS_CONFIG_PATH={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "PPS_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    let system_path = PathBuf::from("/etc/ppsd/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return DisciplineConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {:?}", system_path));
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return DisciplineConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    info!("No config file found, using built-in defaults");
    Ok(DisciplineConfig::default())
}

/// Main daemon run loop.
fn run_daemon(
    config: &DisciplineConfig,
    signal_handler: &SignalHandler,
    max_seconds: u64,
) -> Result<()> {
    let bench = match config.backend {
        BackendKind::Simulated => {
            info!(
                secondary_drift_ppm = config.simulation.secondary_drift_ppm,
                cpu_clock_error_ppm = config.simulation.cpu_clock_error_ppm,
                "Using simulated bench backend"
            );
            SimulatedBench::new(BenchParams::from_config(config))
        }
        BackendKind::External => {
            bail!("external backend requires an out-of-tree board crate; rerun with --simulated")
        }
    };

    let telemetry_state = Arc::new(TelemetryState::new());
    let telemetry = TelemetryCollector::new(Arc::clone(&telemetry_state));

    let mut discipline = Discipline::new(
        config.clone(),
        bench.capture(),
        bench.clone(),
        bench.clone(),
    );

    if config.telemetry.csv {
        println!("{CSV_HEADER}");
    }

    let max_micros = max_seconds as f64 * 1e6;
    let stats_interval_micros = config.telemetry.stats_interval.as_secs_f64() * 1e6;
    let mut next_summary_micros = stats_interval_micros;

    info!("Entering control loop");

    loop {
        if signal_handler.shutdown_requested() {
            info!("Shutdown signal received, stopping control loop");
            break;
        }

        bench.step();
        let report = discipline
            .poll()
            .context("Control-loop pass failed")?;

        if let Some(drift) = report.heartbeat {
            telemetry.state().record_firing(drift.offset_micros);
            if config.telemetry.csv {
                println!("{}", format_csv_line(&drift));
            }
            if drift.offset_micros.abs() > config.telemetry.drift_alert_micros {
                warn!(
                    firing = drift.firing,
                    offset_micros = drift.offset_micros,
                    "Drift offset beyond alert threshold"
                );
            }
        }
        if report.interval_held {
            telemetry.state().record_held_reprogram();
        }
        if report.sample_rejected {
            telemetry.state().record_rejected_sample();
        }

        let now_micros = bench.now_micros();

        if signal_handler.take_summary_request() || now_micros >= next_summary_micros {
            next_summary_micros = now_micros + stats_interval_micros;
            log_summary(&telemetry, &discipline);
        }

        if max_micros > 0.0 && now_micros >= max_micros {
            info!(seconds = max_seconds, "Maximum bench time reached");
            signal_handler.request_shutdown();
        }
    }

    // Final snapshot
    info!("Shutting down...");
    let snapshot = telemetry.snapshot(
        discipline.state(),
        discipline.calibration_ratio(),
        discipline.current_interval_micros(),
        discipline.rate_estimate_micros(),
        discipline.stats(),
    );
    if let Ok(json) = serde_json::to_string(&snapshot) {
        info!(snapshot = %json, "Final telemetry snapshot");
    }
    eprint!("{}", format_text_metrics(&snapshot));
    info!(
        firings = snapshot.firing_count,
        held = snapshot.held_reprograms,
        rejected = snapshot.rejected_samples,
        signals = signal_handler.state().signal_count(),
        final_state = %snapshot.state,
        "Daemon shutdown complete"
    );

    Ok(())
}

/// Log one periodic drift-statistics summary line.
fn log_summary<S, T>(telemetry: &TelemetryCollector, discipline: &Discipline<S, T>)
where
    S: pps_hal::FrequencySampler,
    T: pps_hal::IntervalTimer,
{
    let stats = discipline.stats();
    info!(
        state = %discipline.state(),
        firings = telemetry.state().firing_count(),
        mean_offset_micros = stats.mean_offset_micros().unwrap_or(0.0),
        jitter_micros = stats.jitter_micros().unwrap_or(0.0),
        alerts = stats.alerts,
        held = telemetry.state().held_reprograms(),
        "Drift summary"
    );
}
