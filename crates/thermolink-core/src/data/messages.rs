//! Telemetry record types.
//!
//! | Tag | Record                 | Fields after the timestamp                     |
//! |-----|------------------------|------------------------------------------------|
//! | `I` | [`InertialData`]       | gyroscope xyz, accelerometer xyz               |
//! | `M` | [`MagnetometerData`]   | magnetometer xyz                               |
//! | `Q` | [`QuaternionData`]     | w, x, y, z                                     |
//! | `R` | [`RotationMatrixData`] | xx, xy, xz, yx, yy, yz, zx, zy, zz             |
//! | `A` | [`EulerAnglesData`]    | roll, pitch, yaw                               |
//! | `L` | [`LinearAccelerationData`] | quaternion wxyz, acceleration xyz          |
//! | `E` | [`EarthAccelerationData`]  | quaternion wxyz, acceleration xyz          |
//! | `U` | [`AhrsStatusData`]     | four flags as 0.0 / 1.0                        |
//! | `H` | [`HighGAccelerometerData`] | accelerometer xyz                          |
//! | `T` | [`TemperatureData`]    | temperature                                    |
//! | `B` | [`BatteryData`]        | percentage, voltage, charging status           |
//! | `W` | [`RssiData`]           | percentage, power                              |
//! | `S` | [`SerialAccessoryData`] | raw bytes                                     |
//! | `N` | [`NotificationData`]   | text                                           |
//! | `F` | [`ErrorData`]          | text                                           |

use super::{CodecResult, DataMessage, FieldSink};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn write(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.x)?;
        sink.float(self.y)?;
        sink.float(self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    fn write(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.w)?;
        sink.float(self.x)?;
        sink.float(self.y)?;
        sink.float(self.z)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// -----------------------------------------------------------------------------
// Motion
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InertialData {
    pub timestamp: u64,
    /// Degrees per second
    pub gyroscope: Vector3,
    /// g
    pub accelerometer: Vector3,
}

impl DataMessage for InertialData {
    const TAG: u8 = b'I';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.gyroscope.write(sink)?;
        self.accelerometer.write(sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagnetometerData {
    pub timestamp: u64,
    /// Arbitrary units
    pub magnetometer: Vector3,
}

impl DataMessage for MagnetometerData {
    const TAG: u8 = b'M';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.magnetometer.write(sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HighGAccelerometerData {
    pub timestamp: u64,
    pub accelerometer: Vector3,
}

impl DataMessage for HighGAccelerometerData {
    const TAG: u8 = b'H';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.accelerometer.write(sink)
    }
}

// -----------------------------------------------------------------------------
// Orientation
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuaternionData {
    pub timestamp: u64,
    pub quaternion: Quaternion,
}

impl DataMessage for QuaternionData {
    const TAG: u8 = b'Q';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.quaternion.write(sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrixData {
    pub timestamp: u64,
    /// Row-major
    pub matrix: [[f32; 3]; 3],
}

impl Default for RotationMatrixData {
    fn default() -> Self {
        Self {
            timestamp: 0,
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

impl DataMessage for RotationMatrixData {
    const TAG: u8 = b'R';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.matrix
            .iter()
            .flatten()
            .try_for_each(|&element| sink.float(element))
    }
}

/// Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAnglesData {
    pub timestamp: u64,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl DataMessage for EulerAnglesData {
    const TAG: u8 = b'A';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.roll)?;
        sink.float(self.pitch)?;
        sink.float(self.yaw)
    }
}

/// Gravity-free acceleration in the sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearAccelerationData {
    pub timestamp: u64,
    pub quaternion: Quaternion,
    pub acceleration: Vector3,
}

impl DataMessage for LinearAccelerationData {
    const TAG: u8 = b'L';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.quaternion.write(sink)?;
        self.acceleration.write(sink)
    }
}

/// Gravity-free acceleration in the earth frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EarthAccelerationData {
    pub timestamp: u64,
    pub quaternion: Quaternion,
    pub acceleration: Vector3,
}

impl DataMessage for EarthAccelerationData {
    const TAG: u8 = b'E';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        self.quaternion.write(sink)?;
        self.acceleration.write(sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AhrsStatusData {
    pub timestamp: u64,
    pub initialising: bool,
    pub angular_rate_recovery: bool,
    pub acceleration_recovery: bool,
    pub magnetic_recovery: bool,
}

impl DataMessage for AhrsStatusData {
    const TAG: u8 = b'U';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.flag(self.initialising)?;
        sink.flag(self.angular_rate_recovery)?;
        sink.flag(self.acceleration_recovery)?;
        sink.flag(self.magnetic_recovery)
    }
}

// -----------------------------------------------------------------------------
// Device status
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureData {
    pub timestamp: u64,
    /// Degrees Celsius
    pub temperature: f32,
}

impl DataMessage for TemperatureData {
    const TAG: u8 = b'T';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.temperature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryData {
    pub timestamp: u64,
    pub percentage: f32,
    pub voltage: f32,
    pub charging_status: f32,
}

impl DataMessage for BatteryData {
    const TAG: u8 = b'B';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.percentage)?;
        sink.float(self.voltage)?;
        sink.float(self.charging_status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RssiData {
    pub timestamp: u64,
    pub percentage: f32,
    /// dBm
    pub power: f32,
}

impl DataMessage for RssiData {
    const TAG: u8 = b'W';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.float(self.percentage)?;
        sink.float(self.power)
    }
}

// -----------------------------------------------------------------------------
// Variable length
// -----------------------------------------------------------------------------

/// Bytes received on the serial accessory port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialAccessoryData<'a> {
    pub timestamp: u64,
    pub data: &'a [u8],
}

impl DataMessage for SerialAccessoryData<'_> {
    const TAG: u8 = b'S';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.bytes(self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationData<'a> {
    pub timestamp: u64,
    pub text: &'a [u8],
}

impl DataMessage for NotificationData<'_> {
    const TAG: u8 = b'N';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.bytes(self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorData<'a> {
    pub timestamp: u64,
    pub text: &'a [u8],
}

impl DataMessage for ErrorData<'_> {
    const TAG: u8 = b'F';

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()> {
        sink.bytes(self.text)
    }
}
