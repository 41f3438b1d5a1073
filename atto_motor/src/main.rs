//! # Attocube Motor Adapter Binary
//!
//! Configures one or more positioner controllers, keeps their poll loops
//! running until Ctrl-C, then tears them down in reverse order.
//!
//! # Usage
//!
//! ```bash
//! # Controllers from a config file
//! atto_motor --config config/motor.toml
//!
//! # Single controller against the simulator, with a report at startup
//! atto_motor --port AMC1 --address 192.168.1.50 --axes 3 -s --report 1
//!
//! # Verbose JSON logs
//! atto_motor --config config/motor.toml -v --json
//! ```

use atto_common::config::{ConfigLoader, LogLevel};
use atto_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_DRIVER, MAX_AXES};
use atto_common::motor::MotorController;
use atto_motor::config::{AdapterConfig, ControllerConfig};
use atto_motor::port_registry::PortRegistry;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Attocube motor adapter - piezo positioner controllers with background polling
#[derive(Parser, Debug)]
#[command(name = "atto_motor")]
#[command(version)]
#[command(about = "Motion-controller adapter for networked piezo positioner controllers")]
#[command(long_about = None)]
struct Args {
    /// Path to adapter configuration file (motor.toml).
    /// Ignored when --port is given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port name for a single controller configured from the command line
    #[arg(short, long, requires = "address")]
    port: Option<String>,

    /// Device network address for --port
    #[arg(short, long)]
    address: Option<String>,

    /// Axis count for --port
    #[arg(long, default_value_t = MAX_AXES)]
    axes: usize,

    /// Device driver for --port
    #[arg(short, long, default_value = DEFAULT_DRIVER)]
    driver: String,

    /// Force the simulation driver for every controller
    #[arg(short = 's', long)]
    simulate: bool,

    /// Print a controller report at this detail level after startup and before shutdown
    #[arg(long, value_name = "LEVEL")]
    report: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Adapter startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args);
    let log_level = config.as_ref().ok().map(|c| c.shared.log_level);
    setup_tracing(&args, log_level);
    let mut config = config?;
    config.validate()?;

    info!(
        "{} v{} starting ({} controllers)...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION"),
        config.controllers.len()
    );

    if args.simulate {
        info!("Simulation mode enabled (all controllers)");
        for controller in &mut config.controllers {
            controller.driver = DEFAULT_DRIVER.to_string();
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let mut ports = PortRegistry::default();
    for controller in &config.controllers {
        ports.configure_with(controller)?;
        if let Some(configured) = ports.controller(&controller.port_name) {
            configured.add_param_listener(Box::new(|scope, updates| {
                for update in updates {
                    debug!(?scope, name = %update.name, value = ?update.value, "parameter changed");
                }
            }));
        }
    }

    if let Some(level) = args.report {
        print_reports(&ports, level);
    }

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    if let Some(level) = args.report {
        print_reports(&ports, level);
    }
    ports.shutdown_all();

    info!("Adapter shutdown complete");
    Ok(())
}

/// Build the adapter config from `--port` or from the config file.
fn load_config(args: &Args) -> Result<AdapterConfig, Box<dyn std::error::Error>> {
    if let Some(port) = &args.port {
        let address = args.address.clone().unwrap_or_default();
        let mut controller = ControllerConfig::new(port, &address, args.axes);
        controller.driver = args.driver.clone();
        return Ok(AdapterConfig {
            shared: atto_common::config::SharedConfig {
                log_level: LogLevel::Info,
                service_name: "atto_motor".to_string(),
            },
            controllers: vec![controller],
        });
    }

    let path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    load_file(&path)
}

fn load_file(path: &Path) -> Result<AdapterConfig, Box<dyn std::error::Error>> {
    AdapterConfig::load(path).map_err(|e| format!("{}: {}", path.display(), e).into())
}

fn print_reports(ports: &PortRegistry, level: u32) {
    let mut out = std::io::stdout().lock();
    for controller in ports.controllers() {
        controller.report(&mut out, level);
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: Option<LogLevel>) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        configured.unwrap_or_default()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
