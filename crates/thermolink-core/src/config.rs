//! Compile-time protocol sizes.
//!
//! Every buffer in the protocol stack is fixed-capacity, so these constants
//! bound the largest key, value, frame, and telemetry message the device
//! will ever handle.

/// Maximum number of bytes in a command key.
pub const KEY_SIZE: usize = 64;

/// Maximum number of bytes in a command response value.
pub const VALUE_SIZE: usize = 256;

/// Receive accumulation buffer size per interface.
///
/// A frame (including its `\n` terminator) longer than this is dropped as a
/// buffer overrun.
pub const OBJECT_SIZE: usize = 512;

/// Multiplex frame header: the `^` marker followed by one channel byte.
pub const MUX_HEADER_SIZE: usize = 2;

/// Deepest object/array nesting accepted by the parser. The top-level
/// value sits at depth 0.
pub const MAX_DEPTH: usize = 16;

/// Numbers whose text is this long or longer are rejected as too long.
pub const NUMBER_SIZE: usize = 32;

/// Maximum width of a character-array setting, terminator included.
pub const STRING_SETTING_SIZE: usize = 32;

/// Maximum number of entries in a settings table.
pub const MAX_SETTINGS: usize = 32;

/// Column width used for display names in the pretty settings dump.
pub const MAX_KEY_LENGTH: usize = 32;

/// Scratch buffer size for one encoded telemetry message.
///
/// Large enough for an ASCII text message carrying a full response value:
/// tag, 20-digit timestamp, two commas and the terminator.
pub const MESSAGE_SIZE: usize = VALUE_SIZE + 32;

/// Byte capacity of a raw settings block.
pub const SETTINGS_BLOCK_SIZE: usize = MAX_SETTINGS * STRING_SETTING_SIZE;
