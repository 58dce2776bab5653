use crate::config::STRING_SETTING_SIZE;

/// Storage type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Bool,
    U32,
    F32,
    /// Fixed-width character array, terminator included in the width.
    String,
}

/// Compiled-in default value of a setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    U32(u32),
    F32(f32),
    String {
        value: &'static str,
        /// Stored width in bytes, terminator included
        size: usize,
    },
}

/// One row of a settings table.
///
/// Tables are `const` arrays; the position of a row is its settings index.
///
/// # Example
///
/// ```ignore
/// const TABLE: &[SettingMetadata] = &[
///     SettingMetadata::string("device_name", "Device Name", "Thermometer", 32).preserved(),
///     SettingMetadata::float("temperature_offset", "Temperature Offset", 0.0),
/// ];
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingMetadata {
    /// Wire key used by commands
    pub key: &'static str,
    /// Human-readable name used by the pretty dump
    pub name: &'static str,
    pub default: DefaultValue,
    /// Writes are ignored unless explicitly overridden
    pub read_only: bool,
    /// Kept when defaults are restored without force
    pub preserved: bool,
}

impl SettingMetadata {
    const fn new(key: &'static str, name: &'static str, default: DefaultValue) -> Self {
        Self {
            key,
            name,
            default,
            read_only: false,
            preserved: false,
        }
    }

    pub const fn bool(key: &'static str, name: &'static str, default: bool) -> Self {
        Self::new(key, name, DefaultValue::Bool(default))
    }

    pub const fn uint32(key: &'static str, name: &'static str, default: u32) -> Self {
        Self::new(key, name, DefaultValue::U32(default))
    }

    pub const fn float(key: &'static str, name: &'static str, default: f32) -> Self {
        Self::new(key, name, DefaultValue::F32(default))
    }

    pub const fn string(
        key: &'static str,
        name: &'static str,
        default: &'static str,
        size: usize,
    ) -> Self {
        Self::new(key, name, DefaultValue::String { value: default, size })
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub const fn preserved(mut self) -> Self {
        self.preserved = true;
        self
    }

    pub const fn value_type(&self) -> SettingType {
        match self.default {
            DefaultValue::Bool(_) => SettingType::Bool,
            DefaultValue::U32(_) => SettingType::U32,
            DefaultValue::F32(_) => SettingType::F32,
            DefaultValue::String { .. } => SettingType::String,
        }
    }

    /// Bytes occupied in the raw settings block.
    pub const fn size(&self) -> usize {
        match self.default {
            DefaultValue::Bool(_) => 1,
            DefaultValue::U32(_) | DefaultValue::F32(_) => 4,
            DefaultValue::String { size, .. } => size,
        }
    }

    pub(crate) fn default_value(&self) -> Value<'static> {
        match self.default {
            DefaultValue::Bool(value) => Value::Bool(value),
            DefaultValue::U32(value) => Value::U32(value),
            DefaultValue::F32(value) => Value::F32(value),
            DefaultValue::String { value, .. } => Value::String(value.as_bytes()),
        }
    }
}

/// Borrowed setting value, used both to write a setting and to read one back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    U32(u32),
    F32(f32),
    /// Raw bytes; sanitised to printable ASCII when stored
    String(&'a [u8]),
}

impl Value<'_> {
    pub const fn value_type(&self) -> SettingType {
        match self {
            Value::Bool(_) => SettingType::Bool,
            Value::U32(_) => SettingType::U32,
            Value::F32(_) => SettingType::F32,
            Value::String(_) => SettingType::String,
        }
    }
}

/// Stored setting value. Always within its type's valid domain.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    U32(u32),
    /// Never NaN or infinite
    F32(f32),
    /// Printable ASCII only, shorter than the entry's width
    String(heapless::String<STRING_SETTING_SIZE>),
}

impl SettingValue {
    pub fn as_value(&self) -> Value<'_> {
        match self {
            SettingValue::Bool(value) => Value::Bool(*value),
            SettingValue::U32(value) => Value::U32(*value),
            SettingValue::F32(value) => Value::F32(*value),
            SettingValue::String(value) => Value::String(value.as_bytes()),
        }
    }
}
