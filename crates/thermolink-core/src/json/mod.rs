//! Streaming JSON cursor parser.
//!
//! [`JsonCursor`] parses JSON primitives straight out of a borrowed byte
//! slice into caller-supplied fixed buffers. No tree is built and nothing
//! is allocated. Each operation skips leading whitespace (space, tab, CR,
//! LF), consumes one token and returns a result; the cursor only moves when
//! the operation succeeds.
//!
//! The end of the slice, or an embedded NUL byte, terminates the input.
//!
//! # Limitations
//!
//! A `\uXXXX` escape is decoded to the single low byte of the code unit.
//! Surrogate pairs are not combined and nothing is re-encoded as UTF-8, which
//! is enough for the ASCII-only command protocol. String destinations are
//! therefore byte buffers rather than `str`.
//!
//! # Example
//!
//! ```ignore
//! let mut cursor = JsonCursor::from(r#"{"rate": 100}"#);
//! let mut key: heapless::Vec<u8, 16> = heapless::Vec::new();
//! cursor.object_start()?;
//! cursor.key(&mut key)?;
//! let rate = cursor.number()?;
//! cursor.object_end()?;
//! ```

mod error;

use core::fmt;

pub use error::{JsonError, JsonResult, JsonType};

use crate::config::{MAX_DEPTH, NUMBER_SIZE};

/// Read position into a borrowed JSON document.
#[derive(Debug, Clone, Copy)]
pub struct JsonCursor<'a> {
    json: &'a [u8],
    position: usize,
}

impl<'a> From<&'a str> for JsonCursor<'a> {
    fn from(json: &'a str) -> Self {
        Self::new(json.as_bytes())
    }
}

impl<'a> JsonCursor<'a> {
    pub const fn new(json: &'a [u8]) -> Self {
        Self { json, position: 0 }
    }

    /// Byte offset of the cursor from the start of the document.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Unconsumed input.
    pub fn remaining(&self) -> &'a [u8] {
        self.json.get(self.position..).unwrap_or(&[])
    }

    /// Identifies the type of the next value without consuming anything.
    pub fn peek_type(&self) -> JsonResult<JsonType> {
        let mut scratch = *self;
        scratch.value_type()
    }

    pub fn object_start(&mut self) -> JsonResult<()> {
        self.commit(|c| {
            c.expect_type(JsonType::Object)?;
            c.position += 1;
            c.skip_whitespace();
            Ok(())
        })
    }

    pub fn object_end(&mut self) -> JsonResult<()> {
        self.commit(|c| c.expect_byte(b'}', JsonError::MissingObjectEnd))
    }

    pub fn array_start(&mut self) -> JsonResult<()> {
        self.commit(|c| {
            c.expect_type(JsonType::Array)?;
            c.position += 1;
            c.skip_whitespace();
            Ok(())
        })
    }

    pub fn array_end(&mut self) -> JsonResult<()> {
        self.commit(|c| c.expect_byte(b']', JsonError::MissingArrayEnd))
    }

    pub fn comma(&mut self) -> JsonResult<()> {
        self.commit(|c| c.expect_byte(b',', JsonError::MissingComma))
    }

    /// Parses an object key and the colon that follows it.
    ///
    /// `destination` is cleared first. A key longer than its capacity fails
    /// with [`JsonError::StringTooLong`].
    pub fn key<const N: usize>(&mut self, destination: &mut heapless::Vec<u8, N>) -> JsonResult<()> {
        destination.clear();
        self.commit(|c| c.scan_key(|byte| destination.push(byte).is_ok()))
    }

    /// Parses a string into `destination`, returning the decoded length.
    pub fn string<const N: usize>(
        &mut self,
        destination: &mut heapless::Vec<u8, N>,
    ) -> JsonResult<usize> {
        destination.clear();
        self.commit(|c| c.scan_string(|byte| destination.push(byte).is_ok()))
    }

    /// Validates and discards a string.
    pub fn skip_string(&mut self) -> JsonResult<()> {
        self.commit(|c| c.scan_string(|_| true).map(|_| ()))
    }

    /// Validates a number and returns its text.
    ///
    /// Useful when the value needs more precision than `f32`, such as a
    /// 64-bit timestamp.
    pub fn number_str(&mut self) -> JsonResult<&'a str> {
        self.commit(|c| {
            let text = c.scan_number()?;
            if text.len() >= NUMBER_SIZE {
                return Err(JsonError::NumberTooLong);
            }
            Ok(text)
        })
    }

    pub fn number(&mut self) -> JsonResult<f32> {
        let mut scratch = *self;
        let value = scratch
            .number_str()?
            .parse::<f32>()
            .map_err(|_| JsonError::UnableToParseNumber)?;
        *self = scratch;
        Ok(value)
    }

    /// Parses a non-negative integer without going through `f32`.
    pub fn number_u64(&mut self) -> JsonResult<u64> {
        let mut scratch = *self;
        let value = scratch
            .number_str()?
            .parse::<u64>()
            .map_err(|_| JsonError::UnableToParseNumber)?;
        *self = scratch;
        Ok(value)
    }

    /// Validates and discards a number.
    pub fn skip_number(&mut self) -> JsonResult<()> {
        self.commit(|c| c.scan_number().map(|_| ()))
    }

    pub fn boolean(&mut self) -> JsonResult<bool> {
        self.commit(|c| {
            c.expect_type(JsonType::Boolean)?;
            if c.literal(b"true") {
                Ok(true)
            } else if c.literal(b"false") {
                Ok(false)
            } else {
                Err(JsonError::InvalidSyntax)
            }
        })
    }

    pub fn null(&mut self) -> JsonResult<()> {
        self.commit(|c| {
            c.expect_type(JsonType::Null)?;
            if c.literal(b"null") {
                Ok(())
            } else {
                Err(JsonError::InvalidSyntax)
            }
        })
    }

    /// Validates and discards any value, recursing into objects and arrays.
    ///
    /// Returns the raw text of the value, starting at its first character.
    /// Nesting deeper than [`MAX_DEPTH`] fails with
    /// [`JsonError::MaxDepthExceeded`].
    pub fn skip_value(&mut self) -> JsonResult<&'a [u8]> {
        self.commit(|c| {
            c.skip_whitespace();
            let json = c.json;
            let start = c.position;
            c.parse_value(None, 0)?;
            Ok(&json[start..c.position])
        })
    }

    /// Walks the next value writing one indented line per value type,
    /// followed by a line holding the parse result (`OK` or the error).
    pub fn trace<W: fmt::Write>(&mut self, out: &mut W) -> fmt::Result {
        let mut scratch = *self;
        let mut trace = Trace {
            out: &mut *out,
            result: Ok(()),
        };
        let parsed = scratch.parse_value(Some(&mut trace), 0);
        trace.result?;
        match parsed {
            Ok(()) => {
                *self = scratch;
                writeln!(out, "OK")
            }
            Err(e) => writeln!(out, "{}", e),
        }
    }

    // -----------------------------------------------------------------------
    // Scanning primitives. These move `position` freely; the public wrappers
    // above only keep the new position on success.
    // -----------------------------------------------------------------------

    fn commit<T>(&mut self, parse: impl FnOnce(&mut Self) -> JsonResult<T>) -> JsonResult<T> {
        let mut scratch = *self;
        let value = parse(&mut scratch)?;
        *self = scratch;
        Ok(value)
    }

    fn peek(&self) -> u8 {
        self.byte_at(self.position)
    }

    fn byte_at(&self, position: usize) -> u8 {
        self.json.get(position).copied().unwrap_or(0)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\n' | b'\r') {
            self.position += 1;
        }
    }

    fn value_type(&mut self) -> JsonResult<JsonType> {
        self.skip_whitespace();
        match self.peek() {
            b'"' => Ok(JsonType::String),
            b'-' | b'0'..=b'9' => Ok(JsonType::Number),
            b'{' => Ok(JsonType::Object),
            b'[' => Ok(JsonType::Array),
            b't' | b'f' => Ok(JsonType::Boolean),
            b'n' => Ok(JsonType::Null),
            _ => Err(JsonError::InvalidSyntax),
        }
    }

    fn expect_type(&mut self, expected: JsonType) -> JsonResult<()> {
        if self.value_type()? != expected {
            return Err(JsonError::UnexpectedType);
        }
        Ok(())
    }

    fn expect_byte(&mut self, byte: u8, missing: JsonError) -> JsonResult<()> {
        self.skip_whitespace();
        if self.peek() != byte {
            return Err(missing);
        }
        self.position += 1;
        Ok(())
    }

    fn literal(&mut self, text: &[u8]) -> bool {
        if self.remaining().starts_with(text) {
            self.position += text.len();
            return true;
        }
        false
    }

    fn scan_key(&mut self, sink: impl FnMut(u8) -> bool) -> JsonResult<()> {
        if self.expect_type(JsonType::String).is_err() {
            return Err(JsonError::MissingKey);
        }
        self.scan_string(sink)?;
        self.skip_whitespace();
        if self.peek() != b':' {
            return Err(JsonError::MissingColon);
        }
        self.position += 1;
        Ok(())
    }

    /// Decodes a string, handing each byte to `sink`. The sink returns
    /// `false` once its destination is full.
    fn scan_string(&mut self, mut sink: impl FnMut(u8) -> bool) -> JsonResult<usize> {
        self.expect_type(JsonType::String)?;
        self.position += 1;

        let mut length = 0;
        loop {
            let byte = match self.peek() {
                0 => return Err(JsonError::MissingStringEnd),
                b'"' => {
                    self.position += 1;
                    return Ok(length);
                }
                b'\\' => self.scan_escape()?,
                byte if byte < 0x20 => return Err(JsonError::InvalidStringCharacter),
                byte => {
                    self.position += 1;
                    byte
                }
            };
            if !sink(byte) {
                return Err(JsonError::StringTooLong);
            }
            length += 1;
        }
    }

    fn scan_escape(&mut self) -> JsonResult<u8> {
        let byte = match self.byte_at(self.position + 1) {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => return self.scan_hex_escape(),
            _ => return Err(JsonError::InvalidStringEscapeSequence),
        };
        self.position += 2;
        Ok(byte)
    }

    fn scan_hex_escape(&mut self) -> JsonResult<u8> {
        let start = self.position + 2;
        if !(start..start + 4).all(|i| self.byte_at(i).is_ascii_hexdigit()) {
            return Err(JsonError::InvalidStringHexEscapeSequence);
        }
        let digits = core::str::from_utf8(&self.json[start..start + 4])
            .map_err(|_| JsonError::UnableToParseStringHexEscapeSequence)?;
        let code = u16::from_str_radix(digits, 16)
            .map_err(|_| JsonError::UnableToParseStringHexEscapeSequence)?;
        self.position += 6;
        Ok((code & 0xFF) as u8)
    }

    fn skip_digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.position += 1;
        }
    }

    /// Strict JSON number grammar: optional minus, no leading zeros,
    /// fraction and exponent each need at least one digit.
    fn scan_number(&mut self) -> JsonResult<&'a str> {
        self.expect_type(JsonType::Number)?;
        let start = self.position;

        if self.peek() == b'-' {
            self.position += 1;
            if !self.peek().is_ascii_digit() {
                return Err(JsonError::InvalidNumberFormat);
            }
        }

        if self.peek() == b'0' {
            self.position += 1;
            if self.peek().is_ascii_digit() {
                return Err(JsonError::InvalidNumberFormat);
            }
        } else {
            self.skip_digits();
        }

        if self.peek() == b'.' {
            self.position += 1;
            if !self.peek().is_ascii_digit() {
                return Err(JsonError::InvalidNumberFormat);
            }
            self.skip_digits();
        }

        if matches!(self.peek(), b'e' | b'E') {
            self.position += 1;
            if matches!(self.peek(), b'+' | b'-') {
                self.position += 1;
            }
            if !self.peek().is_ascii_digit() {
                return Err(JsonError::InvalidNumberFormat);
            }
            self.skip_digits();
        }

        let json = self.json;
        core::str::from_utf8(&json[start..self.position]).map_err(|_| JsonError::UnableToParseNumber)
    }

    fn parse_value(&mut self, mut trace: Option<&mut Trace<'_>>, depth: usize) -> JsonResult<()> {
        let kind = self.value_type()?;
        if let Some(trace) = trace.as_deref_mut() {
            trace.line(depth, kind.name());
        }

        match kind {
            JsonType::String => self.scan_string(|_| true).map(|_| ()),
            JsonType::Number => self.scan_number().map(|_| ()),
            JsonType::Object => self.parse_object(trace, depth),
            JsonType::Array => self.parse_array(trace, depth),
            JsonType::Boolean => self.boolean().map(|_| ()),
            JsonType::Null => self.null(),
        }
    }

    fn parse_object(&mut self, mut trace: Option<&mut Trace<'_>>, depth: usize) -> JsonResult<()> {
        if depth >= MAX_DEPTH {
            return Err(JsonError::MaxDepthExceeded);
        }
        self.object_start()?;
        if self.object_end().is_ok() {
            return Ok(());
        }
        loop {
            self.scan_key(|_| true)?;
            self.parse_value(trace.as_deref_mut(), depth + 1)?;
            if self.comma().is_ok() {
                continue;
            }
            return self.object_end();
        }
    }

    fn parse_array(&mut self, mut trace: Option<&mut Trace<'_>>, depth: usize) -> JsonResult<()> {
        if depth >= MAX_DEPTH {
            return Err(JsonError::MaxDepthExceeded);
        }
        self.array_start()?;
        if self.array_end().is_ok() {
            return Ok(());
        }
        loop {
            self.parse_value(trace.as_deref_mut(), depth + 1)?;
            if self.comma().is_ok() {
                continue;
            }
            return self.array_end();
        }
    }
}

/// Writes `bytes` as a quoted JSON string.
///
/// Quote and backslash are escaped, control bytes become `\u00XX` and any
/// other byte is written as the character with that code point.
pub fn write_string<W: fmt::Write + ?Sized>(bytes: &[u8], out: &mut W) -> fmt::Result {
    out.write_char('"')?;
    for &byte in bytes {
        match byte {
            b'"' => out.write_str("\\\"")?,
            b'\\' => out.write_str("\\\\")?,
            0x00..=0x1F | 0x7F => write!(out, "\\u{:04X}", byte)?,
            _ => out.write_char(byte as char)?,
        }
    }
    out.write_char('"')
}

/// Indented structure trace sink. The first write error sticks.
struct Trace<'w> {
    out: &'w mut dyn fmt::Write,
    result: fmt::Result,
}

impl Trace<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        if self.result.is_ok() {
            self.result = writeln!(self.out, "{:indent$}{}", "", text, indent = depth * 4);
        }
    }
}
