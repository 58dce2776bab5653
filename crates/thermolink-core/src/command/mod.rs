//! Newline-framed JSON command bridge.
//!
//! The bridge drains bytes from a set of [`Interface`]s, reassembles
//! `\n`-terminated frames and answers each one on the interface it came
//! from. A frame is either:
//!
//! - a **multiplex frame**, `^` + channel byte + payload, handed verbatim to
//!   [`BridgeContext::mux`], or
//! - a **command frame**, a JSON object holding exactly one key/value pair.
//!
//! Command keys are routed in a fixed order, first match wins:
//!
//! | Step | Route            | Reply                                                  |
//! |------|------------------|--------------------------------------------------------|
//! | 1    | Command table    | Produced by the callback                               |
//! | 2    | Setting key      | Current value (`null` reads, anything else writes)     |
//! | 3    | `enumerate<N>`   | `{"<key N>":<value N>}`, or `null` for a bad index      |
//! | 4    | Unknown hook     | Produced by [`BridgeContext::unknown`]                 |
//! | 5    | Fallback         | `{"error":"Unknown command"}`                          |
//!
//! Framing and parse failures have no command to answer, so they go to
//! [`BridgeContext::error`] instead.

mod error;
mod interface;
mod response;

use heapless::Vec;
use log::{debug, warn};

pub use error::{CommandError, ErrorReport, MuxError};
pub use interface::{Interface, Transport};
pub use response::Response;

use crate::config::{KEY_SIZE, MUX_HEADER_SIZE, OBJECT_SIZE};
use crate::json::JsonCursor;
use crate::key::{key_compare, key_compare_partial};
use crate::settings::{self, Nvm, Settings};

/// Command callback. The cursor sits on the raw value; the callback owns
/// producing the reply.
pub type CommandCallback<C> = fn(&mut C, &mut JsonCursor<'_>, &mut Response<'_>);

/// One row of the command table.
pub struct Command<C> {
    pub key: &'static str,
    pub callback: CommandCallback<C>,
}

impl<C> Command<C> {
    pub const fn new(key: &'static str, callback: CommandCallback<C>) -> Self {
        Self { key, callback }
    }
}

/// Application state and optional hooks threaded through every command.
///
/// All hooks have inert defaults, so an implementation only overrides what
/// it supports.
pub trait BridgeContext {
    type Nvm: Nvm;

    /// Settings store served by steps 2 and 3 of the routing order.
    fn settings(&mut self) -> Option<&mut Settings<Self::Nvm>> {
        None
    }

    /// Allows writes to read-only settings, e.g. during production.
    fn override_read_only(&mut self) -> bool {
        false
    }

    /// Runs after a setting write, before the response is sent.
    fn write_epilogue(&mut self, _index: usize) {}

    /// Handles a key nothing else matched. Returns false to fall back to
    /// the `Unknown command` error.
    fn unknown(&mut self, _key: &[u8], _value: &mut JsonCursor<'_>, _response: &mut Response<'_>) -> bool {
        false
    }

    /// Receives the payload of a multiplex frame, terminator included.
    fn mux(&mut self, _interface: &'static str, _channel: u8, _payload: &[u8]) -> Result<(), MuxError> {
        Err(MuxError::NotSupported)
    }

    /// Surfaces a framing or parse error.
    fn error(&mut self, _interface: &'static str, _error: &CommandError, _transport: &mut dyn Transport) {}
}

pub struct CommandBridge<'a, C> {
    commands: &'a [Command<C>],
}

impl<'a, C: BridgeContext> CommandBridge<'a, C> {
    pub const fn new(commands: &'a [Command<C>]) -> Self {
        Self { commands }
    }

    /// Drains every interface in order, dispatching each complete frame.
    pub fn poll<T: Transport>(&self, interfaces: &mut [Interface<T>], context: &mut C) {
        for interface in interfaces.iter_mut() {
            self.poll_interface(interface, context);
        }
    }

    pub fn poll_interface<T: Transport>(&self, interface: &mut Interface<T>, context: &mut C) {
        let (name, transport, buffer) = interface.parts();
        let mut chunk = [0u8; OBJECT_SIZE];
        loop {
            let count = transport.read(&mut chunk);
            if count == 0 {
                break;
            }

            for &byte in &chunk[..count] {
                // Never full here: the buffer is emptied on reaching capacity
                let _ = buffer.push(byte);
                if byte == b'\n' {
                    self.dispatch(name, &mut *transport, &buffer[..], context);
                    buffer.clear();
                } else if buffer.is_full() {
                    self.report(name, &mut *transport, &CommandError::BufferOverrun, context);
                    buffer.clear();
                }
            }
        }
    }

    /// Handles one externally framed message, which must end with its only
    /// `\n`. The interface's receive buffer is not touched.
    pub fn receive<T: Transport>(&self, interface: &mut Interface<T>, frame: &[u8], context: &mut C) {
        let (name, transport, _) = interface.parts();
        match check_frame(frame) {
            Ok(()) => self.dispatch(name, transport, frame, context),
            Err(e) => self.report(name, transport, &e, context),
        }
    }

    fn dispatch(&self, name: &'static str, transport: &mut dyn Transport, message: &[u8], context: &mut C) {
        let result = if message.first() == Some(&b'^') {
            parse_mux(name, message, context)
        } else {
            self.parse_command(name, transport, message, context)
        };
        if let Err(e) = result {
            self.report(name, transport, &e, context);
        }
    }

    fn report(&self, name: &'static str, transport: &mut dyn Transport, error: &CommandError, context: &mut C) {
        warn!("{}", ErrorReport { interface: name, error });
        context.error(name, error, transport);
    }

    fn parse_command(
        &self,
        name: &'static str,
        transport: &mut dyn Transport,
        message: &[u8],
        context: &mut C,
    ) -> Result<(), CommandError> {
        let text = message.strip_suffix(b"\n").unwrap_or(message);
        debug!("{} RX {}", name, core::str::from_utf8(text).unwrap_or("<non-utf8>"));

        let mut json = JsonCursor::new(text);
        json.object_start().map_err(|_| CommandError::NotJsonObject)?;
        let mut key: Vec<u8, KEY_SIZE> = Vec::new();
        json.key(&mut key).map_err(CommandError::Key)?;
        let value = json.skip_value().map_err(CommandError::Value)?;
        json.object_end().map_err(|_| CommandError::NotSingleKeyValue)?;

        let mut response = Response::new(name, transport, &key);
        self.route(&key, value, &mut response, context);
        Ok(())
    }

    fn route(&self, key: &[u8], value: &[u8], response: &mut Response<'_>, context: &mut C) {
        let mut value = JsonCursor::new(value);

        if let Some(command) = self.commands.iter().find(|c| key_compare(key, c.key.as_bytes())) {
            (command.callback)(context, &mut value, response);
            return;
        }

        if let Some(store) = context.settings() {
            if let Some(index) = settings::json::index_of(store, key) {
                access_setting(index, &mut value, response, context);
                return;
            }
            if let Some(suffix) = key_compare_partial(key, b"enumerate") {
                enumerate(store, suffix, response);
                return;
            }
        }

        if context.unknown(key, &mut value, response) {
            return;
        }
        response.respond_error("Unknown command");
    }
}

fn check_frame(frame: &[u8]) -> Result<(), CommandError> {
    if frame.len() > OBJECT_SIZE {
        return Err(CommandError::BufferOverrun);
    }
    let Some((&last, body)) = frame.split_last() else {
        return Err(CommandError::MissingTermination);
    };
    if body.contains(&b'\n') {
        return Err(CommandError::UnexpectedTermination);
    }
    if last != b'\n' {
        return Err(CommandError::MissingTermination);
    }
    Ok(())
}

fn parse_mux<C: BridgeContext>(name: &'static str, message: &[u8], context: &mut C) -> Result<(), CommandError> {
    // Header plus terminator
    if message.len() < MUX_HEADER_SIZE + 1 {
        return Err(CommandError::InvalidMuxLength);
    }
    let channel = message[1];
    let payload = &message[MUX_HEADER_SIZE..];
    debug!("{} RX 0x{:02X} {} bytes", name, channel, payload.len());
    context.mux(name, channel, payload).map_err(|e| match e {
        MuxError::NotSupported => CommandError::MuxNotSupported,
        MuxError::InvalidChannel => CommandError::InvalidMuxChannel { channel },
    })
}

/// Reads (`null`) or writes one setting, then responds with its value.
fn access_setting<C: BridgeContext>(
    index: usize,
    value: &mut JsonCursor<'_>,
    response: &mut Response<'_>,
    context: &mut C,
) {
    if value.null().is_ok() {
        respond_setting(index, response, context);
        return;
    }

    let override_read_only = context.override_read_only();
    let Some(store) = context.settings() else {
        return;
    };
    if store.metadata()[index].read_only && !override_read_only {
        response.respond_error("Read-only");
        return;
    }
    if let Err(e) = settings::json::set_value(store, index, value, override_read_only) {
        response.respond_error(e);
        return;
    }

    context.write_epilogue(index);
    respond_setting(index, response, context);
}

fn respond_setting<C: BridgeContext>(index: usize, response: &mut Response<'_>, context: &mut C) {
    if let Some(store) = context.settings() {
        let out = response.value_mut();
        out.clear();
        // Setting values always fit in a response value
        let _ = settings::json::write_value(store, index, out);
    }
    response.respond();
}

fn enumerate<N: Nvm>(store: &Settings<N>, suffix: &[u8], response: &mut Response<'_>) {
    let Some(index) = parse_index(suffix) else {
        response.respond_error("Unable to parse index");
        return;
    };
    let index = usize::try_from(index).ok().filter(|&index| index < store.len());
    if let Some(index) = index {
        let out = response.value_mut();
        out.clear();
        let _ = settings::json::write_object(store, index, out);
    }
    response.respond();
}

/// Parses a leading integer the way C's `%i` conversion does: optional
/// whitespace and sign, then `0x` hexadecimal, `0` octal or decimal.
/// Anything after the digits is ignored.
fn parse_index(text: &[u8]) -> Option<i64> {
    let mut rest = text;
    while let Some((byte, tail)) = rest.split_first() {
        if !byte.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }

    let mut negative = false;
    if let Some((&sign, tail)) = rest.split_first() {
        if sign == b'+' || sign == b'-' {
            negative = sign == b'-';
            rest = tail;
        }
    }

    let radix = match rest {
        [b'0', b'x' | b'X', digit, ..] if digit.is_ascii_hexdigit() => {
            rest = &rest[2..];
            16
        }
        [b'0', ..] => 8,
        _ => 10,
    };

    let mut value: i64 = 0;
    let mut digits = 0;
    for &byte in rest {
        let Some(digit) = char::from(byte).to_digit(radix) else {
            break;
        };
        value = value.saturating_mul(i64::from(radix)).saturating_add(i64::from(digit));
        digits += 1;
    }
    if digits == 0 {
        return None;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNvm, MockTransport};
    use crate::settings::tests::TEST_TABLE;
    use std::string::{String, ToString};
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct TestContext {
        settings: Option<Settings<MockNvm>>,
        blinks: usize,
        errors: StdVec<String>,
        epilogues: StdVec<usize>,
        mux_frames: StdVec<(u8, StdVec<u8>)>,
        override_read_only: bool,
        handle_unknown: bool,
        mux_enabled: bool,
    }

    impl TestContext {
        fn with_settings() -> Self {
            let mut settings = Settings::new(TEST_TABLE, Some(MockNvm::new())).unwrap();
            settings.initialise();
            settings.defaults(true);
            Self {
                settings: Some(settings),
                ..Self::default()
            }
        }
    }

    impl BridgeContext for TestContext {
        type Nvm = MockNvm;

        fn settings(&mut self) -> Option<&mut Settings<MockNvm>> {
            self.settings.as_mut()
        }

        fn override_read_only(&mut self) -> bool {
            self.override_read_only
        }

        fn write_epilogue(&mut self, index: usize) {
            self.epilogues.push(index);
        }

        fn unknown(&mut self, key: &[u8], _value: &mut JsonCursor<'_>, response: &mut Response<'_>) -> bool {
            if !self.handle_unknown {
                return false;
            }
            response.set_value(format_args!("{}", key.len()));
            response.respond();
            true
        }

        fn mux(&mut self, _interface: &'static str, channel: u8, payload: &[u8]) -> Result<(), MuxError> {
            if !self.mux_enabled {
                return Err(MuxError::NotSupported);
            }
            if channel != 0x41 {
                return Err(MuxError::InvalidChannel);
            }
            self.mux_frames.push((channel, payload.to_vec()));
            Ok(())
        }

        fn error(&mut self, interface: &'static str, error: &CommandError, _transport: &mut dyn Transport) {
            self.errors.push(ErrorReport { interface, error }.to_string());
        }
    }

    fn blink(context: &mut TestContext, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        context.blinks += 1;
        response.respond();
    }

    fn ping(_context: &mut TestContext, value: &mut JsonCursor<'_>, response: &mut Response<'_>) {
        if response.parse_null(value).is_err() {
            return;
        }
        response.respond_ping("Thermometer", "0000ABCD");
    }

    const COMMANDS: &[Command<TestContext>] = &[Command::new("blink", blink), Command::new("ping", ping)];

    fn exchange(context: &mut TestContext, input: &[u8]) -> String {
        let bridge = CommandBridge::new(COMMANDS);
        let mut interfaces = [Interface::new("USB", MockTransport::new())];
        interfaces[0].transport_mut().inject(input);
        bridge.poll(&mut interfaces, context);
        interfaces[0].transport().sent_str().to_string()
    }

    #[test]
    fn test_blink_invokes_callback_once() {
        let mut context = TestContext::default();
        assert_eq!(exchange(&mut context, b"{\"blink\":null}\n"), "{\"blink\":null}\n");
        assert_eq!(context.blinks, 1);
    }

    #[test]
    fn test_unknown_command() {
        let mut context = TestContext::default();
        assert_eq!(
            exchange(&mut context, b"{\"unknownKey\":1}\n"),
            "{\"unknownKey\":{\"error\":\"Unknown command\"}}\n"
        );
    }

    #[test]
    fn test_unknown_hook_replies() {
        let mut context = TestContext {
            handle_unknown: true,
            ..TestContext::default()
        };
        assert_eq!(exchange(&mut context, b"{\"abc\":1}\n"), "{\"abc\":3}\n");
    }

    #[test]
    fn test_ping_requires_null() {
        let mut context = TestContext::default();
        let reply = exchange(&mut context, b"{\"ping\":null}\n");
        assert_eq!(
            reply,
            "{\"ping\":{\"interface\":\"USB\",\"name\":\"Thermometer\",\"sn\":\"0000ABCD\"}}\n"
        );

        let reply = exchange(&mut context, b"{\"ping\":123}\n");
        assert_eq!(reply, "{\"ping\":{\"error\":\"Unexpected type\"}}\n");
    }

    #[test]
    fn test_echoed_key_is_escaped() {
        let mut context = TestContext::default();
        assert_eq!(
            exchange(&mut context, b"{\"a\\\"b\":1}\n"),
            "{\"a\\\"b\":{\"error\":\"Unknown command\"}}\n"
        );

        let reply = exchange(&mut context, b"{\"x\\ny\\\\z\":1}\n");
        assert_eq!(reply, "{\"x\\u000Ay\\\\z\":{\"error\":\"Unknown command\"}}\n");
        assert_eq!(reply.matches('\n').count(), 1);

        // The reply parses back to the key that was sent
        let mut cursor = JsonCursor::from(reply.trim_end());
        let mut key: heapless::Vec<u8, 16> = heapless::Vec::new();
        cursor.object_start().unwrap();
        cursor.key(&mut key).unwrap();
        assert_eq!(&key[..], b"x\ny\\z");
    }

    #[test]
    fn test_deeply_nested_value_is_rejected() {
        let mut context = TestContext::default();
        let mut frame = StdVec::new();
        frame.extend_from_slice(b"{\"blink\":");
        frame.resize(frame.len() + 200, b'[');
        frame.resize(frame.len() + 200, b']');
        frame.extend_from_slice(b"}\n");
        assert_eq!(exchange(&mut context, &frame), "");
        assert_eq!(context.blinks, 0);
        assert_eq!(
            context.errors,
            ["USB receive error. Unable able to parse value. Maximum depth exceeded."]
        );
    }

    #[test]
    fn test_key_is_fuzzy_and_echoed() {
        let mut context = TestContext::default();
        assert_eq!(exchange(&mut context, b"{ \"BLINK\" : null }\r\n"), "{\"BLINK\":null}\n");
        assert_eq!(context.blinks, 1);
    }

    #[test]
    fn test_frames_split_across_reads() {
        let mut context = TestContext::default();
        let bridge = CommandBridge::new(COMMANDS);
        let mut interfaces = [Interface::new("USB", MockTransport::with_chunk(3))];
        interfaces[0]
            .transport_mut()
            .inject(b"{\"blink\":null}\n{\"blink\":null}\n{\"bl");
        bridge.poll(&mut interfaces, &mut context);

        assert_eq!(context.blinks, 2);
        assert_eq!(interfaces[0].pending(), b"{\"bl");

        interfaces[0].transport_mut().inject(b"ink\":null}\n");
        bridge.poll(&mut interfaces, &mut context);
        assert_eq!(context.blinks, 3);
        assert!(interfaces[0].pending().is_empty());
    }

    #[test]
    fn test_overrun_reports_once_and_recovers() {
        let mut context = TestContext::default();
        let bridge = CommandBridge::new(COMMANDS);
        let mut interfaces = [Interface::new("USB", MockTransport::with_chunk(1))];
        interfaces[0].transport_mut().inject(&[b'x'; OBJECT_SIZE + 5]);
        bridge.poll(&mut interfaces, &mut context);
        assert_eq!(context.errors, ["USB receive error. Buffer overrun."]);
        // Bytes after the overrun start a fresh frame
        assert_eq!(interfaces[0].pending(), b"xxxxx");

        interfaces[0].transport_mut().inject(b"\n{\"blink\":null}\n");
        bridge.poll(&mut interfaces, &mut context);
        assert_eq!(context.blinks, 1);
        assert_eq!(
            context.errors,
            [
                "USB receive error. Buffer overrun.",
                "USB receive error. Not a JSON object.",
            ]
        );
        assert_eq!(interfaces[0].transport().sent_str(), "{\"blink\":null}\n");
    }

    #[test]
    fn test_frame_filling_buffer_exactly_is_dispatched() {
        let mut context = TestContext::default();
        let mut frame = StdVec::new();
        frame.extend_from_slice(b"{\"blink\":null");
        frame.resize(OBJECT_SIZE - 2, b' ');
        frame.extend_from_slice(b"}\n");
        exchange(&mut context, &frame);
        assert_eq!(context.blinks, 1);
        assert!(context.errors.is_empty());
    }

    #[test]
    fn test_malformed_frames() {
        let cases: [(&[u8], &str); 5] = [
            (b"[1]\n", "USB receive error. Not a JSON object."),
            (b"{1:2}\n", "USB receive error. Unable able to parse key. Missing key."),
            (b"{\"a\" 2}\n", "USB receive error. Unable able to parse key. Missing colon."),
            (b"{\"a\":tru}\n", "USB receive error. Unable able to parse value. Invalid syntax."),
            (b"{\"a\":1,\"b\":2}\n", "USB receive error. JSON object is not a single key/value pair."),
        ];
        for (input, expected) in cases {
            let mut context = TestContext::default();
            assert_eq!(exchange(&mut context, input), "");
            assert_eq!(context.errors, [expected]);
        }
    }

    #[test]
    fn test_external_frames() {
        let bridge = CommandBridge::new(COMMANDS);
        let mut interface = Interface::new("BLE", MockTransport::new());
        let mut context = TestContext::default();

        bridge.receive(&mut interface, b"{\"blink\":null}\n", &mut context);
        bridge.receive(&mut interface, b"{\"blink\":null}", &mut context);
        bridge.receive(&mut interface, b"{\"blink\":\nnull}\n", &mut context);
        bridge.receive(&mut interface, &[b' '; OBJECT_SIZE + 1], &mut context);
        bridge.receive(&mut interface, b"", &mut context);

        assert_eq!(context.blinks, 1);
        assert_eq!(interface.transport().sent_str(), "{\"blink\":null}\n");
        assert_eq!(
            context.errors,
            [
                "BLE receive error. Missing termination.",
                "BLE receive error. Unexpected termination.",
                "BLE receive error. Buffer overrun.",
                "BLE receive error. Missing termination.",
            ]
        );
    }

    #[test]
    fn test_mux_frames() {
        let mut context = TestContext::default();
        exchange(&mut context, b"^A\n");
        assert_eq!(context.errors, ["USB receive error. Mux not supported."]);

        let mut context = TestContext {
            mux_enabled: true,
            ..TestContext::default()
        };
        exchange(&mut context, b"^Apayload\n^B\n^\n");
        assert_eq!(context.mux_frames, [(0x41, b"payload\n".to_vec())]);
        assert_eq!(
            context.errors,
            [
                "USB receive error. Invalid mux channel 0x42.",
                "USB receive error. Invalid mux message length.",
            ]
        );
    }

    #[test]
    fn test_setting_read_and_write() {
        let mut context = TestContext::with_settings();
        assert_eq!(exchange(&mut context, b"{\"message_rate\":null}\n"), "{\"message_rate\":100}\n");
        assert_eq!(exchange(&mut context, b"{\"MessageRate\":250}\n"), "{\"MessageRate\":250}\n");
        assert_eq!(context.epilogues, [1]);
        assert_eq!(exchange(&mut context, b"{\"offset\":2}\n"), "{\"offset\":2.000000}\n");
        assert_eq!(
            exchange(&mut context, b"{\"led_enabled\":1}\n"),
            "{\"led_enabled\":{\"error\":\"Unexpected type\"}}\n"
        );
        assert_eq!(context.epilogues, [1, 2]);
    }

    #[test]
    fn test_setting_read_only() {
        let mut context = TestContext::with_settings();
        assert_eq!(
            exchange(&mut context, b"{\"serial_number\":\"1234\"}\n"),
            "{\"serial_number\":{\"error\":\"Read-only\"}}\n"
        );
        assert!(context.epilogues.is_empty());

        context.override_read_only = true;
        assert_eq!(
            exchange(&mut context, b"{\"serial_number\":\"1234\"}\n"),
            "{\"serial_number\":\"1234\"}\n"
        );
        assert_eq!(context.epilogues, [4]);
    }

    #[test]
    fn test_enumerate() {
        let mut context = TestContext::with_settings();
        assert_eq!(
            exchange(&mut context, b"{\"enumerate1\":null}\n"),
            "{\"enumerate1\":{\"message_rate\":100}}\n"
        );
        assert_eq!(
            exchange(&mut context, b"{\"enumerate_0x3\":null}\n"),
            "{\"enumerate_0x3\":{\"device_name\":\"Thermometer\"}}\n"
        );
        assert_eq!(exchange(&mut context, b"{\"enumerate99\":null}\n"), "{\"enumerate99\":null}\n");
        assert_eq!(
            exchange(&mut context, b"{\"enumerate\":null}\n"),
            "{\"enumerate\":{\"error\":\"Unable to parse index\"}}\n"
        );
    }

    #[test]
    fn test_enumerate_needs_settings() {
        let mut context = TestContext::default();
        assert_eq!(
            exchange(&mut context, b"{\"enumerate0\":null}\n"),
            "{\"enumerate0\":{\"error\":\"Unknown command\"}}\n"
        );
    }

    #[test]
    fn test_commands_shadow_settings() {
        const SHADOW: &[Command<TestContext>] = &[Command::new("led_enabled", blink)];
        let mut context = TestContext::with_settings();
        let bridge = CommandBridge::new(SHADOW);
        let mut interfaces = [Interface::new("USB", MockTransport::new())];
        interfaces[0].transport_mut().inject(b"{\"led_enabled\":null}\n");
        bridge.poll(&mut interfaces, &mut context);
        assert_eq!(context.blinks, 1);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index(b"12"), Some(12));
        assert_eq!(parse_index(b"0x1F"), Some(31));
        assert_eq!(parse_index(b"017"), Some(15));
        assert_eq!(parse_index(b"0"), Some(0));
        assert_eq!(parse_index(b" -4abc"), Some(-4));
        assert_eq!(parse_index(b"09"), Some(0));
        assert_eq!(parse_index(b"abc"), None);
        assert_eq!(parse_index(b""), None);
    }
}
