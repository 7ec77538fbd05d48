//! # HALO Control Unit
//!
//! Loads the controller configuration, creates and initializes the motor
//! driver, arms the requested resistance and runs the safety loop until
//! Ctrl-C (or, with `--exit-on-stop`, until the controller stops).

use clap::Parser;
use halo_common::config::{ConfigError, ConfigLoader, LogLevel};
use halo_common::control_unit::config::ControllerConfig;
use halo_common::control_unit::error::CommandError;
use halo_common::control_unit::state::ResistanceLevel;
use halo_control_unit::config::accept_config;
use halo_control_unit::controller::ResistanceController;
use halo_control_unit::cycle::{CycleRunner, rt_setup, share};
use halo_hal::DriverRegistry;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// HALO Control Unit: resistance safety loop
#[derive(Parser, Debug)]
#[command(name = "halo_control_unit")]
#[command(version)]
#[command(about = "Motor resistance safety loop for the HydroHalo line trainer")]
struct Args {
    /// Path to the controller configuration TOML.
    #[arg(short, long, default_value = "config/halo.toml")]
    config: PathBuf,

    /// Driver to use instead of `[driver] name`.
    #[arg(long, value_name = "NAME")]
    driver: Option<String>,

    /// Use the simulation driver.
    #[arg(short, long, conflicts_with = "driver")]
    simulate: bool,

    /// Resistance preset (low, medium, high, extreme).
    #[arg(long, conflicts_with = "amps")]
    level: Option<ResistanceLevel>,

    /// Resistance current [A].
    #[arg(long, allow_negative_numbers = true)]
    amps: Option<f64>,

    /// End the session after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Leave once the controller reaches Stopped.
    #[arg(long)]
    exit_on_stop: bool,

    /// Read telemetry once, report link health and exit.
    #[arg(long)]
    self_check: bool,

    /// List available drivers and exit.
    #[arg(long)]
    list_drivers: bool,

    /// CPU core to pin the cycle thread to (`rt` builds).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (`rt` builds).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    // Parsed before tracing is up so the file can pick the log level.
    let parsed = ControllerConfig::load(&args.config);
    let level = parsed
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("HALO Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, parsed) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("HALO Control Unit shutdown complete");
}

fn run(
    args: &Args,
    parsed: Result<ControllerConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DriverRegistry::with_builtin_drivers();
    if args.list_drivers {
        for name in registry.list_drivers() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = accept_config(parsed?)?;
    if args.simulate {
        config.driver.name = "simulation".to_string();
    } else if let Some(ref name) = args.driver {
        config.driver.name = name.clone();
    }

    let mut driver = registry.create_driver(&config.driver.name)?;
    driver.init(&config.driver)?;
    info!(driver = driver.name(), version = driver.version(), "Driver initialized");

    let cycle_config = config.cycle;
    let mut controller = ResistanceController::with_system_clock(config, driver)?;

    if args.self_check {
        let report = controller.self_check();
        println!("{report}");
        controller.driver_mut().shutdown()?;
        return if report.link_ok {
            Ok(())
        } else {
            Err("self check failed".into())
        };
    }

    arm(&mut controller, args)?;

    rt_setup(args.cpu_core, args.rt_priority)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::Release);
    })?;

    let shared = share(controller);
    let mut runner =
        CycleRunner::new(Arc::clone(&shared), &cycle_config, running).exit_on_stop(args.exit_on_stop);
    runner.run();

    let mut controller = shared.lock();
    let status = controller.current_status();
    info!(
        state = %status.state,
        cycles = status.cycle_count,
        last_emergency = ?status.last_emergency,
        flags = ?status.flags,
        "Final status"
    );
    if let Some(report) = status.last_shutdown {
        info!(?report, "Last shutdown");
    }
    controller.driver_mut().shutdown()?;
    Ok(())
}

/// Apply `--level`/`--amps`/`--duration`. Without a level the controller
/// stays idle and only reports telemetry.
fn arm<D, C>(
    controller: &mut ResistanceController<D, C>,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: halo_common::hal::driver::MotorDriver,
    C: halo_control_unit::clock::Clock,
{
    let amps = match (args.amps, args.level) {
        (Some(amps), _) => amps,
        (None, Some(level)) => controller.config().levels.amps(level),
        (None, None) => {
            info!("No resistance level given, monitoring only");
            return Ok(());
        }
    };

    let result = match args.duration {
        Some(secs) => {
            let duration = Duration::try_from_secs_f64(secs)
                .map_err(|e| format!("invalid --duration {secs}: {e}"))?;
            controller.set_resistance_for(amps, duration)
        }
        None => controller.set_resistance_level(amps),
    };

    match result {
        Ok(outcome) => {
            info!(?outcome, "Resistance armed");
            Ok(())
        }
        Err(CommandError::LinkDown(reason)) => {
            warn!(%reason, "First command failed; holding and retrying every cycle");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Setup tracing subscriber based on CLI arguments and `[shared] log_level`.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
