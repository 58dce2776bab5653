//! Simulated peripherals: a TMP117 on I2C, the LED PWM channel and a
//! microsecond clock.

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Instant;

use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::{debug, trace};
use thermolink_core::device::thermometer::TMP117_ADDRESS;
use thermolink_core::device::timestamp::Clock;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Microsecond ticks since the simulator started.
pub struct InstantClock {
    start: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Clock for InstantClock {
    fn ticks(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn ticks_per_microsecond(&self) -> u64 {
        1
    }
}

// ---------------------------------------------------------------------------
// TMP117
// ---------------------------------------------------------------------------

const REGISTER_TEMPERATURE: u8 = 0x00;

/// Degrees Celsius per LSB.
const RESOLUTION: f64 = 0.0078125;

/// TMP117 whose temperature drifts slowly around 23 °C.
pub struct SimulatedTmp117 {
    clock: InstantClock,
    registers: HashMap<u8, u16>,
    pointer: u8,
}

impl SimulatedTmp117 {
    pub fn new(unique_id: u32) -> Self {
        let registers = HashMap::from([
            (0x06, (unique_id >> 16) as u16),
            (0x08, unique_id as u16),
        ]);
        Self {
            clock: InstantClock::new(),
            registers,
            pointer: 0,
        }
    }

    fn temperature(&self) -> f64 {
        let t = self.clock.seconds();
        23.0 + 3.0 * (t / 120.0).sin() + 0.25 * (t / 7.0).cos()
    }

    fn register(&self, register: u8) -> u16 {
        if register == REGISTER_TEMPERATURE {
            ((self.temperature() / RESOLUTION) as i16) as u16
        } else {
            self.registers.get(&register).copied().unwrap_or(0)
        }
    }
}

impl i2c::ErrorType for SimulatedTmp117 {
    type Error = ErrorKind;
}

impl I2c for SimulatedTmp117 {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if address != TMP117_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        self.pointer = register;
                    }
                }
                Operation::Read(buffer) => {
                    let value = self.register(self.pointer).to_be_bytes();
                    for (byte, source) in buffer.iter_mut().zip(value.iter().cycle()) {
                        *byte = *source;
                    }
                    trace!("TMP117 read 0x{:02X}", self.pointer);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LED
// ---------------------------------------------------------------------------

/// PWM channel that logs duty cycle changes.
#[derive(Default)]
pub struct LoggingPwm {
    duty: u16,
}

impl LoggingPwm {
    const MAX_DUTY: u16 = 255;
}

impl pwm::ErrorType for LoggingPwm {
    type Error = Infallible;
}

impl SetDutyCycle for LoggingPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if duty != self.duty {
            debug!("LED duty {}/{}", duty, Self::MAX_DUTY);
            self.duty = duty;
        }
        Ok(())
    }
}
