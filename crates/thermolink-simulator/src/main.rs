//! Desktop simulator for the thermolink USB thermometer.
//!
//! Runs the thermometer firmware logic against simulated peripherals with
//! stdin/stdout standing in for the USB serial port. Commands are typed one
//! JSON object per line; responses and temperature messages are printed to
//! stdout while logs go to stderr (`RUST_LOG=debug` for detail).
//!
//! ```text
//! $ thermolink-simulator --nvm /tmp/thermometer.bin
//! {"ping":null}
//! {"ping":{"interface":"USB","name":"Thermometer","sn":"C0FFEE01"}}
//! T,1000021,23.1406
//! ```
//!
//! The simulator exits when stdin is closed.

mod hardware;
mod nvm;
mod stdio;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use clap::Parser;
use log::info;

use thermolink_core::command::Interface;
use thermolink_core::device::led::TICK_RATE_HZ;
use thermolink_core::device::{self, Device};
use thermolink_core::settings::{self, Value};

use hardware::{InstantClock, LoggingPwm, SimulatedTmp117};
use nvm::FileNvm;
use stdio::StdioTransport;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Pause between main loop iterations.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

const LED_TICK_INTERVAL: Duration = Duration::from_millis(1000 / TICK_RATE_HZ as u64);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "thermolink-simulator", version, about = "Simulated thermolink USB thermometer on stdin/stdout")]
struct Args {
    /// File holding the persisted settings block
    #[arg(long, default_value = "thermolink-nvm.bin")]
    nvm: PathBuf,

    /// Restore every setting to its default on start-up
    #[arg(long)]
    defaults: bool,

    /// Temperature message interval in milliseconds, overriding the stored value
    #[arg(long)]
    interval: Option<u32>,

    /// Unique ID reported by the simulated TMP117
    #[arg(long, default_value_t = 0xC0FF_EE01, value_parser = parse_unique_id)]
    unique_id: u32,
}

fn parse_unique_id(text: &str) -> Result<u32, String> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("expected a hexadecimal ID: {}", e))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let nvm = FileNvm::new(&args.nvm);
    let fresh = !nvm.exists();
    info!("Settings image {}", nvm.path().display());

    let mut device = Device::new(
        SimulatedTmp117::new(args.unique_id),
        LoggingPwm::default(),
        InstantClock::new(),
        nvm,
    )
    .map_err(|e| anyhow!("device start-up failed: {}", e))?;

    if args.defaults || fresh {
        info!("Loading default settings");
        device.load_defaults(true);
    }
    if let Some(interval) = args.interval {
        device
            .settings_mut()
            .set(device::TEMPERATURE_MESSAGE_INTERVAL, Value::U32(interval), false)
            .map_err(|e| anyhow!("interval override rejected: {}", e))?;
    }
    device.apply_settings();

    let mut dump = String::new();
    settings::json::write_all(device.settings(), &mut dump).context("rendering settings")?;
    info!("Settings:\n{}", dump);

    let transport = StdioTransport::spawn().context("spawning stdin reader")?;
    let mut interfaces = [Interface::new("USB", transport)];

    info!("Thermometer running, close stdin to exit");
    let mut next_led_tick = Instant::now();
    while !interfaces[0].transport().is_closed() {
        device.poll(&mut interfaces);

        if Instant::now() >= next_led_tick {
            device.tick_led();
            next_led_tick += LED_TICK_INTERVAL;
        }

        thread::sleep(POLL_INTERVAL);
    }

    info!("stdin closed, exiting");
    Ok(())
}
