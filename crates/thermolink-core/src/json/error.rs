use thiserror_no_std::Error;

/// Failure kinds reported by the JSON cursor parser.
///
/// The display strings double as the wire text of `{"error":"..."}`
/// responses, so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JsonError {
    #[error("Invalid syntax")]
    InvalidSyntax,
    #[error("Unexpected type")]
    UnexpectedType,
    #[error("Missing object end")]
    MissingObjectEnd,
    #[error("Missing array end")]
    MissingArrayEnd,
    #[error("Missing comma")]
    MissingComma,
    #[error("Missing key")]
    MissingKey,
    #[error("Missing colon")]
    MissingColon,
    #[error("Missing string end")]
    MissingStringEnd,
    #[error("String too long")]
    StringTooLong,
    /// Unescaped control character (below 0x20) inside a string
    #[error("Invalid string character")]
    InvalidStringCharacter,
    #[error("Invalid string escape sequence")]
    InvalidStringEscapeSequence,
    /// `\u` not followed by exactly four hex digits
    #[error("Invalid string hex escape sequence")]
    InvalidStringHexEscapeSequence,
    #[error("Unable to parse string hex escape sequence")]
    UnableToParseStringHexEscapeSequence,
    #[error("Invalid number format")]
    InvalidNumberFormat,
    #[error("Number too long")]
    NumberTooLong,
    #[error("Unable to parse number")]
    UnableToParseNumber,
    /// Objects and arrays nested deeper than `MAX_DEPTH`
    #[error("Maximum depth exceeded")]
    MaxDepthExceeded,
}

pub type JsonResult<T> = Result<T, JsonError>;

/// JSON value type as identified by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Number,
    Object,
    Array,
    Boolean,
    Null,
}

impl JsonType {
    /// Lower-case name used by the diagnostic trace.
    pub const fn name(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
        }
    }
}
