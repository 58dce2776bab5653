use core::fmt::{self, Write};

use heapless::{String, Vec};
use log::debug;

use super::Transport;
use crate::config::{KEY_SIZE, VALUE_SIZE};
use crate::json::{write_string, JsonCursor, JsonResult};

/// Worst case frame: every key byte escaped as `\u00XX`, the value, the
/// braces, the colon and the terminator.
const FRAME_SIZE: usize = KEY_SIZE * 6 + 2 + VALUE_SIZE + 4;

/// Reply to one inbound command.
///
/// Created by the bridge with the echoed key and a value of `null`.
/// Writing it produces `{"<key>":<value>}\n` on the originating interface,
/// with the key re-escaped so the frame is always one line of valid JSON.
pub struct Response<'r> {
    interface: &'static str,
    transport: &'r mut dyn Transport,
    key: Vec<u8, KEY_SIZE>,
    value: String<VALUE_SIZE>,
}

impl<'r> Response<'r> {
    pub fn new(interface: &'static str, transport: &'r mut dyn Transport, key: &[u8]) -> Self {
        let mut echoed = Vec::new();
        // Truncate to the key capacity
        let _ = echoed.extend_from_slice(&key[..key.len().min(KEY_SIZE)]);
        let mut value = String::new();
        let _ = value.push_str("null");
        Self {
            interface,
            transport,
            key: echoed,
            value,
        }
    }

    /// Name of the interface the command arrived on.
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Mutable access to the value text, for renderers that write into it.
    pub fn value_mut(&mut self) -> &mut String<VALUE_SIZE> {
        &mut self.value
    }

    /// Replaces the value text. Output beyond the value capacity is dropped.
    pub fn set_value(&mut self, args: fmt::Arguments<'_>) {
        self.value.clear();
        let _ = self.value.write_fmt(args);
    }

    /// Writes the response frame.
    pub fn respond(&mut self) {
        let mut frame: String<FRAME_SIZE> = String::new();
        // Cannot overflow: FRAME_SIZE covers the worst case
        let _ = frame
            .write_char('{')
            .and_then(|_| write_string(&self.key, &mut frame))
            .and_then(|_| write!(frame, ":{}}}\n", self.value));
        debug!("{} TX {}", self.interface, frame.trim_end());
        self.transport.write(frame.as_bytes());
    }

    /// Responds with `{"interface":"..","name":"..","sn":".."}`.
    pub fn respond_ping(&mut self, name: &str, serial_number: &str) {
        let interface = self.interface;
        let value = &mut self.value;
        value.clear();
        let _ = write!(value, "{{\"interface\":\"{}\",\"name\":", interface)
            .and_then(|_| write_string(name.as_bytes(), &mut *value))
            .and_then(|_| value.write_str(",\"sn\":"))
            .and_then(|_| write_string(serial_number.as_bytes(), &mut *value))
            .and_then(|_| value.write_char('}'));
        self.respond();
    }

    /// Responds with `{"error":"<error>"}`.
    pub fn respond_error(&mut self, error: impl fmt::Display) {
        self.set_value(format_args!("{{\"error\":\"{}\"}}", error));
        self.respond();
    }

    /// Writes bytes to the originating interface outside the response frame.
    pub fn write_raw(&mut self, data: &[u8]) {
        self.transport.write(data);
    }

    // -----------------------------------------------------------------------
    // Parse helpers: on failure they respond with the parser error and
    // return it, so callbacks can simply bail out with `let ... else`.
    // -----------------------------------------------------------------------

    pub fn parse_null(&mut self, value: &mut JsonCursor<'_>) -> JsonResult<()> {
        value.null().inspect_err(|e| self.respond_error(e))
    }

    pub fn parse_boolean(&mut self, value: &mut JsonCursor<'_>) -> JsonResult<bool> {
        value.boolean().inspect_err(|e| self.respond_error(e))
    }

    pub fn parse_number(&mut self, value: &mut JsonCursor<'_>) -> JsonResult<f32> {
        value.number().inspect_err(|e| self.respond_error(e))
    }

    pub fn parse_u64(&mut self, value: &mut JsonCursor<'_>) -> JsonResult<u64> {
        value.number_u64().inspect_err(|e| self.respond_error(e))
    }

    pub fn parse_string<const N: usize>(
        &mut self,
        value: &mut JsonCursor<'_>,
        destination: &mut Vec<u8, N>,
    ) -> JsonResult<usize> {
        value.string(destination).inspect_err(|e| self.respond_error(e))
    }
}
