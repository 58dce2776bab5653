//! Thermometer device built on the protocol stack.
//!
//! [`Device`] owns the settings store and the peripherals, serves the
//! command table below through the [`CommandBridge`], and streams periodic
//! temperature messages to every interface.
//!
//! | Command     | Value  | Effect                                              |
//! |-------------|--------|-----------------------------------------------------|
//! | `ping`      | null   | Reply with interface, device name and serial number |
//! | `blink`     | null   | Flash the LED once                                  |
//! | `strobe`    | null   | Strobe the LED                                      |
//! | `note`      | string | Echo the text back as a notification message        |
//! | `timestamp` | number | Set the microsecond timestamp                       |
//! | `save`      | null   | Persist settings to NVM                             |
//! | `default`   | null   | Restore non-preserved defaults                      |
//! | `apply`     | null   | Apply pending setting changes                       |

pub mod led;
pub mod thermometer;
pub mod timestamp;

use core::fmt::Write;

use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;
use heapless::{String, Vec};
use log::{debug, info, warn};

use crate::command::{BridgeContext, Command, CommandBridge, CommandError, ErrorReport, Interface, Response, Transport};
use crate::config::{MESSAGE_SIZE, VALUE_SIZE};
use crate::data::{self, Encoding, ErrorData, NotificationData, TemperatureData};
use crate::json::JsonCursor;
use crate::settings::{Nvm, SettingMetadata, Settings, SettingsResult, Value};

use led::Led;
use thermometer::Thermometer;
use timestamp::{Clock, Timestamp};

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// -----------------------------------------------------------------------------
// Settings table
// -----------------------------------------------------------------------------

pub const DEVICE_NAME: usize = 0;
pub const SERIAL_NUMBER: usize = 1;
pub const FIRMWARE_VERSION_INDEX: usize = 2;
pub const ASCII_MODE_ENABLED: usize = 3;
pub const TEMPERATURE_OFFSET: usize = 4;
pub const TEMPERATURE_MESSAGE_INTERVAL: usize = 5;

pub const SETTINGS: &[SettingMetadata] = &[
    SettingMetadata::string("device_name", "Device Name", "Thermometer", 32).preserved(),
    SettingMetadata::string("serial_number", "Serial Number", "00000000", 16)
        .read_only()
        .preserved(),
    SettingMetadata::string("firmware_version", "Firmware Version", FIRMWARE_VERSION, 16).read_only(),
    SettingMetadata::bool("ascii_mode_enabled", "ASCII Mode Enabled", true),
    SettingMetadata::float("temperature_offset", "Temperature Offset", 0.0),
    SettingMetadata::uint32("temperature_message_interval", "Temperature Message Interval", 1000),
];

fn stamp_firmware_version<N: Nvm>(settings: &mut Settings<N>) {
    let _ = settings.set(FIRMWARE_VERSION_INDEX, Value::String(FIRMWARE_VERSION.as_bytes()), true);
}

// -----------------------------------------------------------------------------
// Device
// -----------------------------------------------------------------------------

pub struct Device<I, P, K, N> {
    settings: Settings<N>,
    thermometer: Thermometer<I>,
    led: Led<P>,
    timestamp: Timestamp<K>,
    /// Thermometer unique ID, if it could be read at start-up
    unique_id: Option<u32>,
    encoding: Encoding,
    temperature_offset: f32,
    /// Microseconds between temperature messages
    message_interval: u64,
    last_message: u64,
}

impl<I, P, K, N> Device<I, P, K, N>
where
    I: I2c,
    P: SetDutyCycle,
    K: Clock,
    N: Nvm,
{
    /// Loads settings from `nvm`, stamps the thermometer's unique ID as the
    /// serial number and applies every setting.
    pub fn new(i2c: I, pwm: P, clock: K, nvm: N) -> SettingsResult<Self> {
        let mut settings = Settings::new(SETTINGS, Some(nvm))?
            .with_initialise_epilogue(stamp_firmware_version)
            .with_defaults_epilogue(stamp_firmware_version);
        settings.initialise();

        let mut thermometer = Thermometer::new(i2c);
        let unique_id = thermometer
            .read_unique_id()
            .inspect_err(|e| warn!("Serial number unavailable: {}", e))
            .ok();

        let timestamp = Timestamp::new(clock);
        let last_message = timestamp.uptime();
        let mut device = Self {
            settings,
            thermometer,
            led: Led::new(pwm),
            timestamp,
            unique_id,
            encoding: Encoding::Ascii,
            temperature_offset: 0.0,
            message_interval: 0,
            last_message,
        };
        device.stamp_serial_number();
        device.apply_settings();
        Ok(device)
    }

    /// Restores defaults, keeping preserved settings unless
    /// `overwrite_preserved` is set. The serial number is re-stamped.
    pub fn load_defaults(&mut self, overwrite_preserved: bool) {
        self.settings.defaults(overwrite_preserved);
        self.stamp_serial_number();
    }

    /// Runs one iteration of the main loop: serve commands, apply pending
    /// settings, then send a temperature message if one is due.
    pub fn poll<T: Transport>(&mut self, interfaces: &mut [Interface<T>]) {
        let commands = Self::commands();
        CommandBridge::new(&commands).poll(interfaces, self);
        self.apply_settings();

        let now = self.timestamp.uptime();
        if now.wrapping_sub(self.last_message) < self.message_interval {
            return;
        }
        self.last_message = now;
        self.send_temperature(interfaces);
    }

    /// Handles one externally framed command on `interface`.
    pub fn receive<T: Transport>(&mut self, interface: &mut Interface<T>, frame: &[u8]) {
        let commands = Self::commands();
        CommandBridge::new(&commands).receive(interface, frame, self);
    }

    /// Advances the LED; call at [`led::TICK_RATE_HZ`].
    pub fn tick_led(&mut self) {
        self.led.tick();
    }

    /// Applies every setting whose applied flag is clear.
    pub fn apply_settings(&mut self) {
        for index in 0..self.settings.len() {
            if !self.settings.apply_pending(index) {
                continue;
            }
            match index {
                ASCII_MODE_ENABLED => {
                    let ascii = self.settings.get_bool(index).unwrap_or(true);
                    self.encoding = if ascii { Encoding::Ascii } else { Encoding::Binary };
                }
                TEMPERATURE_OFFSET => {
                    self.temperature_offset = self.settings.get_f32(index).unwrap_or(0.0);
                }
                TEMPERATURE_MESSAGE_INTERVAL => {
                    let milliseconds = self.settings.get_u32(index).unwrap_or(1000);
                    self.message_interval = u64::from(milliseconds) * 1000;
                }
                _ => {}
            }
            debug!("Applied setting {}", self.settings.metadata()[index].key);
        }
    }

    pub fn settings(&self) -> &Settings<N> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings<N> {
        &mut self.settings
    }

    pub fn led(&self) -> &Led<P> {
        &self.led
    }

    pub fn timestamp(&self) -> &Timestamp<K> {
        &self.timestamp
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn stamp_serial_number(&mut self) {
        let Some(id) = self.unique_id else {
            return;
        };
        let mut serial: String<16> = String::new();
        let _ = write!(serial, "{:08X}", id);
        if self.settings.set(SERIAL_NUMBER, Value::String(serial.as_bytes()), true).is_ok() {
            info!("Serial number {}", serial);
        }
    }

    fn send_temperature<T: Transport>(&mut self, interfaces: &mut [Interface<T>]) {
        let Ok(temperature) = self.thermometer.read_temperature() else {
            return;
        };
        let message = TemperatureData {
            timestamp: self.timestamp.get(),
            temperature: temperature + self.temperature_offset,
        };

        let mut buffer = [0u8; MESSAGE_SIZE];
        match data::encode(&message, self.encoding, &mut buffer) {
            Ok(length) => {
                for interface in interfaces.iter_mut() {
                    interface.write(&buffer[..length]);
                }
            }
            Err(e) => warn!("Temperature message not sent: {}", e),
        }
    }

    fn commands() -> [Command<Self>; 8] {
        [
            Command::new("ping", Self::ping),
            Command::new("blink", Self::blink),
            Command::new("strobe", Self::strobe),
            Command::new("note", Self::note),
            Command::new("timestamp", Self::set_timestamp),
            Command::new("save", Self::save),
            Command::new("default", Self::restore_defaults),
            Command::new("apply", Self::apply),
        ]
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn ping(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        let name = self.settings.get_str(DEVICE_NAME).unwrap_or_default();
        let serial = self.settings.get_str(SERIAL_NUMBER).unwrap_or_default();
        response.respond_ping(name, serial);
    }

    fn blink(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        self.led.blink();
        response.respond();
    }

    fn strobe(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        self.led.strobe();
        response.respond();
    }

    fn note(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        let mut text: Vec<u8, VALUE_SIZE> = Vec::new();
        if response.parse_string(value, &mut text).is_err() {
            return;
        }
        let message = NotificationData {
            timestamp: self.timestamp.get(),
            text: &text,
        };
        let mut buffer = [0u8; MESSAGE_SIZE];
        match data::encode_ascii(&message, &mut buffer) {
            Ok(length) => {
                response.write_raw(&buffer[..length]);
                response.respond();
            }
            Err(e) => {
                warn!("Notification not sent: {}", e);
                response.respond_error(e);
            }
        }
    }

    fn set_timestamp(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        let Ok(timestamp) = response.parse_u64(value) else {
            return;
        };
        self.timestamp.set(timestamp);
        response.respond();
    }

    fn save(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        self.settings.save();
        response.respond();
    }

    fn restore_defaults(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        self.load_defaults(false);
        response.respond();
    }

    fn apply(&mut self, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        self.apply_settings();
        response.respond();
    }
}

impl<I, P, K, N> BridgeContext for Device<I, P, K, N>
where
    I: I2c,
    P: SetDutyCycle,
    K: Clock,
    N: Nvm,
{
    type Nvm = N;

    fn settings(&mut self) -> Option<&mut Settings<N>> {
        Some(&mut self.settings)
    }

    fn write_epilogue(&mut self, index: usize) {
        debug!("Setting {} written", self.settings.metadata()[index].key);
    }

    /// Reports the error as an ASCII error message on the interface it
    /// arose on.
    fn error(&mut self, interface: &'static str, error: &CommandError, transport: &mut dyn Transport) {
        let mut text: String<VALUE_SIZE> = String::new();
        let _ = write!(text, "{}", ErrorReport { interface, error });
        let message = ErrorData {
            timestamp: self.timestamp.uptime(),
            text: text.as_bytes(),
        };
        let mut buffer = [0u8; MESSAGE_SIZE];
        match data::encode_ascii(&message, &mut buffer) {
            Ok(length) => transport.write(&buffer[..length]),
            Err(e) => warn!("Error message not sent: {}", e),
        }
    }
}
