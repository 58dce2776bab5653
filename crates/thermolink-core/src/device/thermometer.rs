use embedded_hal::i2c::I2c;
use log::error;
use thiserror_no_std::Error;

/// Fixed I2C address of the TMP117 (ADD0 tied to ground).
pub const TMP117_ADDRESS: u8 = 0x48;

const REGISTER_TEMPERATURE: u8 = 0x00;
const REGISTER_UNIQUE_ID_UPPER: u8 = 0x06;
const REGISTER_UNIQUE_ID_LOWER: u8 = 0x08;

/// Degrees Celsius per LSB of the temperature register.
const RESOLUTION: f32 = 0.0078125;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThermometerError {
    #[error("TMP117 I2C transfer failed reading register 0x{register:02X}")]
    I2c { register: u8 },
}

/// TMP117 digital temperature sensor.
pub struct Thermometer<I> {
    i2c: I,
}

impl<I: I2c> Thermometer<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Latest conversion result in degrees Celsius.
    pub fn read_temperature(&mut self) -> Result<f32, ThermometerError> {
        let raw = self.read_register(REGISTER_TEMPERATURE)? as i16;
        Ok(f32::from(raw) * RESOLUTION)
    }

    /// Factory-programmed 32-bit identifier, used as the serial number.
    pub fn read_unique_id(&mut self) -> Result<u32, ThermometerError> {
        let upper = self.read_register(REGISTER_UNIQUE_ID_UPPER)?;
        let lower = self.read_register(REGISTER_UNIQUE_ID_LOWER)?;
        Ok((u32::from(upper) << 16) | u32::from(lower))
    }

    pub fn release(self) -> I {
        self.i2c
    }

    fn read_register(&mut self, register: u8) -> Result<u16, ThermometerError> {
        let mut bytes = [0u8; 2];
        self.i2c
            .write_read(TMP117_ADDRESS, &[register], &mut bytes)
            .map_err(|e| {
                error!("TMP117 read of register 0x{:02X} failed: {:?}", register, e);
                ThermometerError::I2c { register }
            })?;
        Ok(u16::from_be_bytes(bytes))
    }
}
