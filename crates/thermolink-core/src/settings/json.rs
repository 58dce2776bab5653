//! JSON view of the settings store.
//!
//! Converts setting values to and from JSON text: key lookup, value and
//! object rendering, a pretty-printed dump of the whole store, and typed
//! writes driven by the [`JsonCursor`](crate::json::JsonCursor) parser.

use core::fmt::{self, Write};

use log::{debug, warn};

use super::{Nvm, SetOutcome, Settings, SettingType, Value};
use crate::config::{KEY_SIZE, MAX_KEY_LENGTH, VALUE_SIZE};
use crate::json::{write_string, JsonCursor, JsonError, JsonResult};
use crate::key::key_compare;

/// Finds the index of the setting whose key fuzzy-matches `key`.
pub fn index_of<N: Nvm>(settings: &Settings<N>, key: &[u8]) -> Option<usize> {
    settings
        .metadata()
        .iter()
        .position(|entry| key_compare(key, entry.key.as_bytes()))
}

pub fn key<N: Nvm>(settings: &Settings<N>, index: usize) -> Option<&'static str> {
    settings.metadata().get(index).map(|entry| entry.key)
}

/// Writes the JSON form of one value: `true`/`false`, a quoted string,
/// a float with six decimals, or an unsigned integer.
pub fn write_value<N: Nvm, W: Write>(settings: &Settings<N>, index: usize, out: &mut W) -> fmt::Result {
    match settings.get(index).ok_or(fmt::Error)? {
        Value::Bool(value) => out.write_str(if value { "true" } else { "false" }),
        Value::U32(value) => write!(out, "{}", value),
        Value::F32(value) => write!(out, "{:.6}", value),
        Value::String(bytes) => write_string(bytes, out),
    }
}

/// Writes `{"<key>":<value>}` for one setting.
pub fn write_object<N: Nvm, W: Write>(settings: &Settings<N>, index: usize, out: &mut W) -> fmt::Result {
    let key = key(settings, index).ok_or(fmt::Error)?;
    write!(out, "{{\"{}\":", key)?;
    write_value(settings, index, out)?;
    out.write_char('}')
}

/// Writes every setting as a pretty-printed object keyed by display name,
/// with the values aligned in one column.
pub fn write_all<N: Nvm, W: Write>(settings: &Settings<N>, out: &mut W) -> fmt::Result {
    out.write_str("{\n")?;
    for (index, entry) in settings.metadata().iter().enumerate() {
        let padding = MAX_KEY_LENGTH.saturating_sub(entry.name.len());
        write!(out, "    \"{}\"{:padding$} : ", entry.name, "", padding = padding)?;
        write_value(settings, index, out)?;
        if index + 1 < settings.len() {
            out.write_char(',')?;
        }
        out.write_char('\n')?;
    }
    out.write_str("}\n")
}

/// Parses `value` according to the type of the setting named by `key` and
/// stores it.
///
/// An unknown key is not an error: its value is validated, skipped and
/// ignored. Parse failures are returned unchanged.
pub fn set_key_value<N: Nvm>(
    settings: &mut Settings<N>,
    key: &[u8],
    value: &mut JsonCursor<'_>,
    override_read_only: bool,
) -> JsonResult<()> {
    match index_of(settings, key) {
        Some(index) => set_value(settings, index, value, override_read_only).map(|_| ()),
        None => value.skip_value().map(|_| ()),
    }
}

/// Parses `value` according to the type of setting `index` and stores it.
/// An out-of-range index skips the value and reports it unchanged.
pub fn set_value<N: Nvm>(
    settings: &mut Settings<N>,
    index: usize,
    value: &mut JsonCursor<'_>,
    override_read_only: bool,
) -> JsonResult<SetOutcome> {
    let Some(entry) = settings.metadata().get(index) else {
        return value.skip_value().map(|_| SetOutcome::Unchanged);
    };
    let outcome = match entry.value_type() {
        SettingType::Bool => {
            let parsed = value.boolean()?;
            store(settings, index, Value::Bool(parsed), override_read_only)
        }
        SettingType::U32 => {
            let parsed = value
                .number_str()?
                .parse::<f64>()
                .map_err(|_| JsonError::UnableToParseNumber)?;
            // Saturates at both ends
            store(settings, index, Value::U32(parsed as u32), override_read_only)
        }
        SettingType::F32 => {
            let parsed = value.number()?;
            store(settings, index, Value::F32(parsed), override_read_only)
        }
        SettingType::String => {
            let mut parsed: heapless::Vec<u8, VALUE_SIZE> = heapless::Vec::new();
            value.string(&mut parsed)?;
            store(settings, index, Value::String(&parsed), override_read_only)
        }
    };
    Ok(outcome)
}

/// Applies every key/value pair of a JSON object.
pub fn set_object<N: Nvm>(
    settings: &mut Settings<N>,
    object: &mut JsonCursor<'_>,
    override_read_only: bool,
) -> JsonResult<()> {
    object.object_start()?;
    if object.object_end().is_ok() {
        return Ok(());
    }

    let mut key: heapless::Vec<u8, KEY_SIZE> = heapless::Vec::new();
    loop {
        object.key(&mut key)?;
        set_key_value(settings, &key, object, override_read_only)?;
        if object.comma().is_ok() {
            continue;
        }
        return object.object_end();
    }
}

fn store<N: Nvm>(
    settings: &mut Settings<N>,
    index: usize,
    value: Value<'_>,
    override_read_only: bool,
) -> SetOutcome {
    match settings.set(index, value, override_read_only) {
        Ok(SetOutcome::ReadOnly) => {
            debug!("Ignored write to read-only setting {}", index);
            SetOutcome::ReadOnly
        }
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Setting write failed: {}", e);
            SetOutcome::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNvm;
    use crate::settings::tests::TEST_TABLE;
    use heapless::String;

    fn settings() -> Settings<MockNvm> {
        let mut settings = Settings::new(TEST_TABLE, Some(MockNvm::new())).unwrap();
        settings.initialise();
        settings.defaults(true);
        settings
    }

    fn value(settings: &Settings<MockNvm>, index: usize) -> String<64> {
        let mut out = String::new();
        write_value(settings, index, &mut out).unwrap();
        out
    }

    #[test]
    fn test_index_of_is_fuzzy() {
        let settings = settings();
        assert_eq!(index_of(&settings, b"Message Rate"), Some(1));
        assert_eq!(index_of(&settings, b"devicename"), Some(3));
        assert_eq!(index_of(&settings, b"nope"), None);
        assert_eq!(key(&settings, 2), Some("offset"));
        assert_eq!(key(&settings, 9), None);
    }

    #[test]
    fn test_value_rendering() {
        let settings = settings();
        assert_eq!(value(&settings, 0).as_str(), "true");
        assert_eq!(value(&settings, 1).as_str(), "100");
        assert_eq!(value(&settings, 2).as_str(), "1.500000");
        assert_eq!(value(&settings, 3).as_str(), "\"Thermometer\"");
    }

    #[test]
    fn test_string_value_is_escaped() {
        let mut settings = settings();
        settings.set(3, Value::String(br#"a"b\c"#), false).unwrap();
        assert_eq!(value(&settings, 3).as_str(), r#""a\"b\\c""#);
    }

    #[test]
    fn test_rendered_values_parse_back_unchanged() {
        let mut settings = settings();
        settings.set(2, Value::F32(-2.25), false).unwrap();
        settings.set(3, Value::String(br#"a"b\c"#), false).unwrap();
        for index in 0..settings.len() {
            settings.apply_pending(index);
        }

        for index in 0..4 {
            let text = value(&settings, index);
            let outcome = set_value(&mut settings, index, &mut JsonCursor::from(text.as_str()), false);
            assert_eq!(outcome, Ok(SetOutcome::Unchanged), "{}", text);
            assert_eq!(value(&settings, index), text);
            assert!(!settings.apply_pending(index), "{}", text);
        }
    }

    #[test]
    fn test_write_object() {
        let settings = settings();
        let mut out: String<64> = String::new();
        write_object(&settings, 1, &mut out).unwrap();
        assert_eq!(out.as_str(), r#"{"message_rate":100}"#);
        assert!(write_object(&settings, 9, &mut out).is_err());
    }

    #[test]
    fn test_write_all_aligns_columns() {
        let settings = settings();
        let mut out: String<1024> = String::new();
        write_all(&settings, &mut out).unwrap();

        let lines: heapless::Vec<&str, 8> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "{");
        assert_eq!(lines[6], "}");
        assert!(lines[1].starts_with("    \"LED Enabled\" "));
        assert!(lines[1].ends_with(" : true,"));
        assert!(lines[5].ends_with(" : \"0000\""));
        let column = lines[1].find(" : ").unwrap();
        assert_eq!(column, 4 + MAX_KEY_LENGTH + 2);
        assert!(lines[1..6].iter().all(|line| line.find(" : ") == Some(column)));
    }

    #[test]
    fn test_set_key_value_by_type() {
        let mut settings = settings();
        set_key_value(&mut settings, b"led_enabled", &mut JsonCursor::from("false"), false).unwrap();
        set_key_value(&mut settings, b"MessageRate", &mut JsonCursor::from("250.7"), false).unwrap();
        set_key_value(&mut settings, b"offset", &mut JsonCursor::from("-0.25"), false).unwrap();
        set_key_value(&mut settings, b"device_name", &mut JsonCursor::from("\"Oven\""), false).unwrap();

        assert_eq!(settings.get_bool(0), Some(false));
        assert_eq!(settings.get_u32(1), Some(250));
        assert_eq!(settings.get_f32(2), Some(-0.25));
        assert_eq!(settings.get_str(3), Some("Oven"));
    }

    #[test]
    fn test_set_key_value_u32_saturates() {
        let mut settings = settings();
        set_key_value(&mut settings, b"message_rate", &mut JsonCursor::from("-5"), false).unwrap();
        assert_eq!(settings.get_u32(1), Some(0));
        set_key_value(&mut settings, b"message_rate", &mut JsonCursor::from("1e12"), false).unwrap();
        assert_eq!(settings.get_u32(1), Some(u32::MAX));
    }

    #[test]
    fn test_set_key_value_reports_parse_errors() {
        let mut settings = settings();
        assert_eq!(
            set_key_value(&mut settings, b"led_enabled", &mut JsonCursor::from("1"), false),
            Err(JsonError::UnexpectedType)
        );
        assert_eq!(
            set_key_value(&mut settings, b"offset", &mut JsonCursor::from("01"), false),
            Err(JsonError::InvalidNumberFormat)
        );
        assert_eq!(
            set_key_value(&mut settings, b"unknown", &mut JsonCursor::from("[1,"), false),
            Err(JsonError::InvalidSyntax)
        );
        assert_eq!(
            set_key_value(&mut settings, b"unknown", &mut JsonCursor::from("[1]"), false),
            Ok(())
        );
    }

    #[test]
    fn test_set_object() {
        let mut settings = settings();
        let mut cursor = JsonCursor::from(
            r#"{ "offset": 2.5, "unknown": {"x": [1]}, "serial_number": "9999", "led_enabled": false }"#,
        );
        set_object(&mut settings, &mut cursor, false).unwrap();
        assert_eq!(settings.get_f32(2), Some(2.5));
        assert_eq!(settings.get_bool(0), Some(false));
        // Read-only without override
        assert_eq!(settings.get_str(4), Some("0000"));

        assert_eq!(set_object(&mut settings, &mut JsonCursor::from("{}"), false), Ok(()));
        assert_eq!(
            set_object(&mut settings, &mut JsonCursor::from(r#"{"offset":1 "x":2}"#), false),
            Err(JsonError::MissingObjectEnd)
        );
    }
}
