//! `rover` – relay-driven rover controller.
//!
//! Startup:
//!
//! 1. Parse arguments and initialise logging.
//! 2. Load `~/.rover/config.toml` (or `--config`), apply environment and
//!    command-line overrides.  Any configuration error is fatal (exit 2).
//! 3. Build the motor drivers (Raspberry Pi GPIO, or the simulator with `--sim`).
//! 4. Connect to the relay and drive the motors until Ctrl-C.

mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use config::{Driver, ReconnectMode, RoverConfig};
use rover_hal::{GpioMotor, HostPowerOff, MotorPair, ShutdownAction, SimMotor, SimPowerOff};
use rover_kernel::Dispatcher;
use rover_middleware::{ConnectionManager, SignalRTransport};
use rover_runtime::Rover;
use rover_types::RoverError;

#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "Drive a two-motor rover from a SignalR relay")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Relay URL; overrides SIGNALR_URL and the config file.
    url: Option<String>,

    /// Config file to use instead of ~/.rover/config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Drive simulated motors and never power the host off.
    #[arg(long)]
    sim: bool,

    /// Keep reconnecting with backoff after the relay link is lost.
    #[arg(long)]
    persistent: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);

    if let Some(Command::InitConfig { force }) = cli.command {
        init_config(&config_path, force);
        return;
    }

    // Before the Tokio runtime exists; see `init_tracing`.
    let _telemetry = rover_runtime::init_tracing("rover");
    print_banner();

    let mut cfg = match config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => fail_config(&e),
    };
    if cli.sim {
        cfg.motors.driver = Driver::Sim;
    }
    if cli.persistent {
        cfg.relay.reconnect = ReconnectMode::Persistent;
    }
    let endpoint = match cfg.validate().and_then(|()| cfg.relay_url(cli.url.as_deref())) {
        Ok(url) => url,
        Err(e) => fail_config(&e),
    };

    println!("  Relay   {}", endpoint.as_str().bold());
    println!("  Driver  {:?}", cfg.motors.driver);
    println!();

    let dispatcher = match build_dispatcher(&cfg) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}: {}", "Hardware error".red().bold(), e);
            process::exit(1);
        }
    };
    let connection = ConnectionManager::new(
        SignalRTransport::new(cfg.hub_settings()),
        cfg.connection_config(endpoint),
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Runtime error".red().bold(), e);
            process::exit(1);
        }
    };
    runtime.block_on(Rover::new(dispatcher, connection).run());
    info!("rover exited");
}

fn build_dispatcher(cfg: &RoverConfig) -> Result<Dispatcher, RoverError> {
    let motors = match cfg.motors.driver {
        Driver::Gpio => {
            let [left_a, left_b] = cfg.motors.left_pins;
            let [right_a, right_b] = cfg.motors.right_pins;
            MotorPair::new(
                GpioMotor::open("left_motor", left_a, left_b)?,
                GpioMotor::open("right_motor", right_a, right_b)?,
            )
        }
        Driver::Sim => MotorPair::new(SimMotor::new("left_motor"), SimMotor::new("right_motor")),
    };
    let power: Box<dyn ShutdownAction> = match cfg.motors.driver {
        Driver::Gpio => Box::new(HostPowerOff::from_command(&cfg.shutdown.command)?),
        Driver::Sim => Box::new(SimPowerOff::new()),
    };
    Ok(Dispatcher::new(motors, power))
}

fn init_config(path: &std::path::Path, force: bool) {
    if path.exists() && !force {
        eprintln!(
            "{} {} already exists; use --force to overwrite.",
            "✗".red().bold(),
            path.display()
        );
        process::exit(2);
    }
    match config::save_to(&RoverConfig::default(), path) {
        Ok(()) => println!("{} Config written to {}", "✓".green().bold(), path.display().to_string().bold()),
        Err(e) => fail_config(&e),
    }
}

fn fail_config(e: &RoverError) -> ! {
    eprintln!("{}: {}", "Config error".red().bold(), e);
    process::exit(2);
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___                    "#.bold().cyan());
    println!("{}", r#"  / _ \___ _  _____ ____  "#.bold().cyan());
    println!("{}", r#" / , _/ _ \ |/ / -_) __/  "#.bold().cyan());
    println!("{}", r#"/_/|_|\___/___/\__/_/     "#.bold().cyan());
    println!();
    println!("  {} {}", "rover".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!();
}
