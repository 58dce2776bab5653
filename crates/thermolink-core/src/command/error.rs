use core::fmt;

use thiserror_no_std::Error;

use crate::json::JsonError;

/// Framing and parse failures that no single command can answer.
///
/// These never produce a command response. They are logged and handed to
/// [`BridgeContext::error`](super::BridgeContext::error) together with the
/// name of the interface they arose on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Buffer overrun.")]
    BufferOverrun,
    /// Externally framed message with a `\n` before its last byte
    #[error("Unexpected termination.")]
    UnexpectedTermination,
    #[error("Missing termination.")]
    MissingTermination,
    #[error("Invalid mux message length.")]
    InvalidMuxLength,
    #[error("Mux not supported.")]
    MuxNotSupported,
    #[error("Invalid mux channel 0x{channel:02X}.")]
    InvalidMuxChannel { channel: u8 },
    #[error("Not a JSON object.")]
    NotJsonObject,
    #[error("Unable able to parse key. {0}.")]
    Key(JsonError),
    #[error("Unable able to parse value. {0}.")]
    Value(JsonError),
    #[error("JSON object is not a single key/value pair.")]
    NotSingleKeyValue,
}

/// Rejection returned by a multiplex handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MuxError {
    #[error("Mux not supported")]
    NotSupported,
    #[error("Invalid mux channel")]
    InvalidChannel,
}

/// Full error report line: `<interface> receive error. <message>`.
pub struct ErrorReport<'a> {
    pub interface: &'a str,
    pub error: &'a CommandError,
}

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} receive error. {}", self.interface, self.error)
    }
}
