//! Telemetry message codec.
//!
//! Each record type in [`messages`] describes its wire schema once through
//! [`DataMessage`]; [`encode_binary`] and [`encode_ascii`] turn that schema
//! into the two wire encodings.
//!
//! # Binary frame
//!
//! ```text
//! [0x80 + tag] [timestamp: u64 LE] [fields...] 0x0A
//! ```
//!
//! Every byte before the terminator is byte-stuffed: `0x0A` becomes
//! `0xDB 0xDC` and `0xDB` becomes `0xDB 0xDD`, so the only bare `0x0A` in a
//! frame is the terminator. Floats are IEEE-754 `f32`, little-endian. The
//! tag bias sets the high bit of the first byte, which tells binary frames
//! apart from ASCII lines.
//!
//! # ASCII line
//!
//! ```text
//! <tag>,<timestamp>,<field>,...\n
//! ```
//!
//! Floats use four decimal places. Byte and text fields have every byte
//! outside printable ASCII replaced by `?`, so a line never contains a
//! stray `\n`.

pub mod messages;

use core::fmt::{self, Write};

use thiserror_no_std::Error;

pub use messages::*;

/// Binary frame terminator.
pub const FRAME_END: u8 = 0x0A;
/// Escape byte introducing a two-byte substitution.
pub const FRAME_ESC: u8 = 0xDB;
/// Second byte of an escaped terminator.
pub const FRAME_ESC_END: u8 = 0xDC;
/// Second byte of an escaped escape byte.
pub const FRAME_ESC_ESC: u8 = 0xDD;

/// Bias added to the tag of a binary frame.
pub const BINARY_TAG_BIAS: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The encoded message does not fit the destination
    #[error("Destination buffer too small (capacity: {capacity})")]
    BufferTooSmall { capacity: usize },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Wire encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    Ascii,
}

/// Receives the fields of a message in wire order.
pub trait FieldSink {
    fn float(&mut self, value: f32) -> CodecResult<()>;

    /// Variable-length byte or text payload.
    fn bytes(&mut self, data: &[u8]) -> CodecResult<()>;

    fn flag(&mut self, value: bool) -> CodecResult<()> {
        self.float(if value { 1.0 } else { 0.0 })
    }
}

/// A telemetry record with a single-character tag, a microsecond
/// timestamp and a fixed field schema.
pub trait DataMessage {
    /// ASCII tag character, e.g. `b'T'` for temperature.
    const TAG: u8;

    fn timestamp(&self) -> u64;

    /// Feeds every field after the timestamp to `sink`.
    fn write_fields(&self, sink: &mut dyn FieldSink) -> CodecResult<()>;
}

/// Encodes `message` with the chosen encoding.
pub fn encode<M: DataMessage>(message: &M, encoding: Encoding, destination: &mut [u8]) -> CodecResult<usize> {
    match encoding {
        Encoding::Binary => encode_binary(message, destination),
        Encoding::Ascii => encode_ascii(message, destination),
    }
}

/// Encodes a byte-stuffed binary frame, returning its length.
pub fn encode_binary<M: DataMessage>(message: &M, destination: &mut [u8]) -> CodecResult<usize> {
    let mut writer = BinaryWriter {
        destination,
        length: 0,
    };
    writer.stuffed(BINARY_TAG_BIAS.wrapping_add(M::TAG))?;
    for byte in message.timestamp().to_le_bytes() {
        writer.stuffed(byte)?;
    }
    message.write_fields(&mut writer)?;
    writer.raw(FRAME_END)?;
    Ok(writer.length)
}

/// Encodes a comma-separated ASCII line, returning its length.
pub fn encode_ascii<M: DataMessage>(message: &M, destination: &mut [u8]) -> CodecResult<usize> {
    let capacity = destination.len();
    let mut writer = AsciiWriter {
        destination,
        length: 0,
    };
    write!(writer, "{},{}", M::TAG as char, message.timestamp())
        .map_err(|_| CodecError::BufferTooSmall { capacity })?;
    message.write_fields(&mut writer)?;
    writer.push(b'\n')?;
    Ok(writer.length)
}

struct BinaryWriter<'d> {
    destination: &'d mut [u8],
    length: usize,
}

impl BinaryWriter<'_> {
    fn raw(&mut self, byte: u8) -> CodecResult<()> {
        let capacity = self.destination.len();
        let slot = self
            .destination
            .get_mut(self.length)
            .ok_or(CodecError::BufferTooSmall { capacity })?;
        *slot = byte;
        self.length += 1;
        Ok(())
    }

    fn stuffed(&mut self, byte: u8) -> CodecResult<()> {
        match byte {
            FRAME_END => {
                self.raw(FRAME_ESC)?;
                self.raw(FRAME_ESC_END)
            }
            FRAME_ESC => {
                self.raw(FRAME_ESC)?;
                self.raw(FRAME_ESC_ESC)
            }
            _ => self.raw(byte),
        }
    }
}

impl FieldSink for BinaryWriter<'_> {
    fn float(&mut self, value: f32) -> CodecResult<()> {
        value.to_le_bytes().into_iter().try_for_each(|byte| self.stuffed(byte))
    }

    fn bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        data.iter().try_for_each(|&byte| self.stuffed(byte))
    }
}

struct AsciiWriter<'d> {
    destination: &'d mut [u8],
    length: usize,
}

impl AsciiWriter<'_> {
    fn push(&mut self, byte: u8) -> CodecResult<()> {
        let capacity = self.destination.len();
        let slot = self
            .destination
            .get_mut(self.length)
            .ok_or(CodecError::BufferTooSmall { capacity })?;
        *slot = byte;
        self.length += 1;
        Ok(())
    }
}

impl Write for AsciiWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.bytes().try_for_each(|byte| self.push(byte)).map_err(|_| fmt::Error)
    }
}

impl FieldSink for AsciiWriter<'_> {
    fn float(&mut self, value: f32) -> CodecResult<()> {
        let capacity = self.destination.len();
        write!(self, ",{:.4}", value).map_err(|_| CodecError::BufferTooSmall { capacity })
    }

    fn bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        self.push(b',')?;
        data.iter().try_for_each(|&byte| {
            self.push(if (0x20..=0x7E).contains(&byte) { byte } else { b'?' })
        })
    }
}
