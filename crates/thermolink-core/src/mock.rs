//! Hardware doubles for unit tests.

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::i2c::{self, I2c, Operation};
use embedded_hal::pwm::{self, SetDutyCycle};
use std::collections::VecDeque;
use std::vec::Vec;

use crate::command::Transport;
use crate::config::SETTINGS_BLOCK_SIZE;
use crate::device::timestamp::Clock;
use crate::settings::Nvm;

/// Serial link with an injectable receive queue and a captured transmit log.
#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Largest number of bytes handed out per `read`, 0 for unlimited
    chunk: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits every `read` to `chunk` bytes.
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            chunk,
            ..Self::default()
        }
    }

    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    pub fn sent_str(&self) -> &str {
        core::str::from_utf8(&self.tx).unwrap_or("<binary>")
    }

    pub fn clear(&mut self) {
        self.tx.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let limit = if self.chunk == 0 { buffer.len() } else { self.chunk.min(buffer.len()) };
        let mut count = 0;
        while count < limit {
            let Some(byte) = self.rx.pop_front() else {
                break;
            };
            buffer[count] = byte;
            count += 1;
        }
        count
    }

    fn write(&mut self, data: &[u8]) {
        self.tx.extend_from_slice(data);
    }
}

/// Flash-like NVM, erased to `0xFF`.
#[derive(Debug, Clone)]
pub struct MockNvm {
    storage: [u8; SETTINGS_BLOCK_SIZE],
    writes: usize,
}

impl MockNvm {
    pub fn new() -> Self {
        Self {
            storage: [0xFF; SETTINGS_BLOCK_SIZE],
            writes: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Nvm for MockNvm {
    fn read(&mut self, destination: &mut [u8]) {
        let length = destination.len().min(self.storage.len());
        destination[..length].copy_from_slice(&self.storage[..length]);
    }

    fn write(&mut self, data: &[u8]) {
        let length = data.len().min(self.storage.len());
        self.storage[..length].copy_from_slice(&data[..length]);
        self.writes += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockI2cError;

impl i2c::Error for MockI2cError {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
    }
}

/// Register-file I2C device answering at one address.
///
/// A write selects the register pointer; a read returns the selected
/// 16-bit register big-endian.
#[derive(Debug)]
pub struct MockI2c {
    address: u8,
    registers: [u16; 16],
    pointer: usize,
    pub fail: bool,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 16],
            pointer: 0,
            fail: false,
        }
    }

    pub fn set_register(&mut self, register: u8, value: u16) {
        self.registers[usize::from(register) & 0x0F] = value;
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = MockI2cError;
}

impl I2c for MockI2c {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if self.fail || address != self.address {
            return Err(MockI2cError);
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        self.pointer = usize::from(register) & 0x0F;
                    }
                }
                Operation::Read(buffer) => {
                    let bytes = self.registers[self.pointer].to_be_bytes();
                    for (slot, byte) in buffer.iter_mut().zip(bytes.iter().cycle()) {
                        *slot = *byte;
                    }
                }
            }
        }
        Ok(())
    }
}

/// PWM channel recording every duty cycle it is given.
#[derive(Debug, Default)]
pub struct MockPwm {
    pub history: Vec<u16>,
}

impl MockPwm {
    pub const MAX_DUTY: u16 = 1000;

    pub fn duty(&self) -> Option<u16> {
        self.history.last().copied()
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.history.push(duty);
        Ok(())
    }
}

/// Tick counter advanced by hand, one tick per microsecond.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: Cell<u64>,
}

impl ManualClock {
    pub fn advance_us(&self, microseconds: u64) {
        self.ticks.set(self.ticks.get().wrapping_add(microseconds));
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.set(ticks);
    }
}

impl Clock for ManualClock {
    fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    fn ticks_per_microsecond(&self) -> u64 {
        1
    }
}
