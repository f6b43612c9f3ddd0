//! CLI Entry Point for pull_machine
//!
//! Provides command-line interface for:
//! - Running a headless acquisition session (serial or simulated sensor)
//! - Listing serial ports
//! - Parsing a single frame, for checking firmware output by hand
//!
//! # Usage
//!
//! Run against the sensor, recording until Ctrl+C:
//! ```bash
//! pull_machine run --record
//! ```
//!
//! Run against the simulated sensor for ten seconds:
//! ```bash
//! pull_machine run --simulate --duration 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use pull_machine::acquisition::{parse_frame, source, SimulatedSensor};
use pull_machine::config::PullMachineConfig;
use pull_machine::kinematics::Linkage;
use pull_machine::logging;
use pull_machine::sampler::Sampler;
use pull_machine::session::PullMachine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pull_machine")]
#[command(about = "Pull machine sensor acquisition and power derivation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire, derive and print a status line every second
    Run {
        /// Configuration file (defaults to config/pull_machine.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Serial port, overrides the configuration
        #[arg(long)]
        port: Option<String>,

        /// Baud rate, overrides the configuration
        #[arg(long)]
        baud: Option<u32>,

        /// Use the simulated sensor instead of the serial port
        #[arg(long)]
        simulate: bool,

        /// Start recording immediately; the CSV is written on exit
        #[arg(long)]
        record: bool,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long, value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Exit with an error if the sensor cannot be opened
        #[arg(long)]
        strict: bool,
    },

    /// List serial ports and the one auto-detection would pick
    Ports {
        /// Text matched against port descriptions
        #[arg(long, default_value = "Arduino")]
        hint: String,
    },

    /// Parse one frame and show the derived values
    Parse {
        /// Frame text, e.g. "12.5;3.1"
        line: String,

        /// Configuration file for calibration constants
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            port,
            baud,
            simulate,
            record,
            duration,
            strict,
        } => {
            let mut config = load_config(config)?;
            if let Some(port) = port {
                config.serial.port = Some(port);
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            config.validate()?;
            logging::init_from_config(&config)?;
            run_session(config, simulate, record, duration, strict).await
        }
        Commands::Ports { hint } => list_ports(&hint),
        Commands::Parse { line, config } => parse_line(&line, load_config(config)?),
    }
}

/// `--duration` in seconds; negative, infinite and NaN values are rejected.
fn parse_duration(arg: &str) -> Result<Duration> {
    let secs: f64 = arg
        .parse()
        .with_context(|| format!("'{arg}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("'{arg}' is not a valid duration"))
}

fn load_config(path: Option<PathBuf>) -> Result<PullMachineConfig> {
    let config = match path {
        Some(path) => PullMachineConfig::load_from(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PullMachineConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

async fn run_session(
    config: PullMachineConfig,
    simulate: bool,
    record: bool,
    duration: Option<Duration>,
    strict: bool,
) -> Result<()> {
    println!("Pull Machine - {}", config.application.name);

    let mut machine = PullMachine::new(config);
    let link = if simulate {
        machine.connect_source(Box::new(SimulatedSensor::default()))
    } else {
        machine.connect_serial()
    };
    if let Err(e) = link {
        if strict {
            return Err(e).context("opening sensor link");
        }
        eprintln!("Sensor unavailable ({e}); continuing without live data");
    }
    if record {
        machine.start_recording();
    }

    let machine = Arc::new(Mutex::new(machine));
    let status = Arc::clone(&machine);
    let mut last_print = f64::NEG_INFINITY;
    let sampler = Sampler::new(Arc::clone(&machine)).spawn(move |sample| {
        if sample.t - last_print >= 1.0 {
            last_print = sample.t;
            println!("[{:8.2}s] {}", sample.t, status.lock().display());
        }
    });

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.context("waiting for Ctrl+C")?,
        _ = deadline => {}
    }

    println!("Shutting down...");
    let ticks = sampler.stop().await?;

    let mut machine = machine.lock();
    if let Some(stats) = machine.worker_stats() {
        println!(
            "Frames: {} accepted, {} rejected, {} timeouts, {} I/O errors",
            stats.frames_accepted, stats.frames_rejected, stats.timeouts, stats.io_errors
        );
    }
    println!("Ticks: {ticks}");
    if let Some(path) = machine.shutdown()? {
        println!("Recording saved to {}", path.display());
    }
    Ok(())
}

fn list_ports(hint: &str) -> Result<()> {
    let ports = source::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in &ports {
        println!("{:<20} {}", port.name, port.description);
    }
    match source::select_port(&ports, hint) {
        Some(port) => println!("Auto-detect ('{hint}') would use {}", port.name),
        None => println!("Auto-detect ('{hint}') matches nothing"),
    }
    Ok(())
}

fn parse_line(line: &str, config: PullMachineConfig) -> Result<()> {
    let reading = parse_frame(line.as_bytes())?;
    let linkage = Linkage::from(&config.calibration);
    let angle = reading.angle_deg + config.calibration.angle_offset_deg;
    println!("Raw angle:      {:8.2}°", reading.angle_deg);
    println!("Angle α:        {:8.2}°", angle);
    println!("Pressure:       {:8.2} bar", reading.pressure_bar);
    println!("Piston length:  {:8.3} m", linkage.piston_length(angle));
    println!("Force:          {:8.1} N", linkage.force(reading.pressure_bar));
    Ok(())
}
