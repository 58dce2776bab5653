//! Typed settings store with NVM persistence hooks.
//!
//! A [`Settings`] instance owns one value per row of a `const`
//! [`SettingMetadata`] table plus a per-index "applied" flag. Values only
//! change through [`Settings::set`], which sanitises every write so the
//! store never holds a NaN/Inf float or a non-printable string byte.
//!
//! | Operation          | Effect                                                      |
//! |--------------------|-------------------------------------------------------------|
//! | `initialise`       | Load the raw block from NVM (or erased `0xFF`) and sanitise |
//! | `defaults`         | Restore compiled-in defaults, optionally keeping preserved  |
//! | `set`              | Typed write; identical writes are ignored                   |
//! | `save`             | Flush the raw block to NVM                                  |
//! | `apply_pending`    | Read-and-set the applied flag of one index                  |
//!
//! The raw block stores the entries in index order: booleans as one byte,
//! `u32`/`f32` as four little-endian bytes, strings at their fixed width
//! padded with NUL.

pub mod json;
mod metadata;

use heapless::Vec;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::config::{MAX_SETTINGS, SETTINGS_BLOCK_SIZE, STRING_SETTING_SIZE};

pub use metadata::{DefaultValue, SettingMetadata, SettingType, SettingValue, Value};

/// Errors from building or addressing a settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Settings table has {count} entries (max: {max})")]
    TooManySettings { count: usize, max: usize },
    #[error("Setting {index} has invalid string size {size}")]
    InvalidStringSize { index: usize, size: usize },
    #[error("Settings block needs {size} bytes (max: {max})")]
    BlockTooLarge { size: usize, max: usize },
    #[error("Unknown settings index {index}")]
    IndexOutOfRange { index: usize },
    #[error("Type mismatch for setting {index}")]
    TypeMismatch { index: usize },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Outcome of a [`Settings::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value stored and the applied flag cleared
    Changed,
    /// Identical to the current value; nothing happened
    Unchanged,
    /// Read-only entry and no override; nothing happened
    ReadOnly,
}

/// Non-volatile memory holding the raw settings block.
pub trait Nvm {
    /// Fill `destination` with the stored block.
    fn read(&mut self, destination: &mut [u8]);

    /// Replace the stored block with `data`.
    fn write(&mut self, data: &[u8]);
}

impl<T: Nvm + ?Sized> Nvm for &mut T {
    fn read(&mut self, destination: &mut [u8]) {
        (**self).read(destination)
    }

    fn write(&mut self, data: &[u8]) {
        (**self).write(data)
    }
}

/// Placeholder for stores without a backing NVM.
#[derive(Debug, Default)]
pub struct NoNvm;

impl Nvm for NoNvm {
    fn read(&mut self, destination: &mut [u8]) {
        destination.fill(0xFF);
    }

    fn write(&mut self, _data: &[u8]) {}
}

/// Hook run after `initialise` or `defaults`.
pub type Epilogue<N> = fn(&mut Settings<N>);

pub struct Settings<N> {
    metadata: &'static [SettingMetadata],
    values: Vec<SettingValue, MAX_SETTINGS>,
    applied: Vec<bool, MAX_SETTINGS>,
    nvm: Option<N>,
    initialise_epilogue: Option<Epilogue<N>>,
    defaults_epilogue: Option<Epilogue<N>>,
}

impl<N: Nvm> Settings<N> {
    /// Creates a store holding the table defaults.
    ///
    /// Call [`Settings::initialise`] before use to load persisted values.
    pub fn new(metadata: &'static [SettingMetadata], nvm: Option<N>) -> SettingsResult<Self> {
        if metadata.len() > MAX_SETTINGS {
            return Err(SettingsError::TooManySettings {
                count: metadata.len(),
                max: MAX_SETTINGS,
            });
        }

        let mut block_size = 0;
        for (index, entry) in metadata.iter().enumerate() {
            if let DefaultValue::String { size, .. } = entry.default {
                if size == 0 || size > STRING_SETTING_SIZE {
                    return Err(SettingsError::InvalidStringSize { index, size });
                }
            }
            block_size += entry.size();
        }
        if block_size > SETTINGS_BLOCK_SIZE {
            return Err(SettingsError::BlockTooLarge {
                size: block_size,
                max: SETTINGS_BLOCK_SIZE,
            });
        }

        let mut values = Vec::new();
        let mut applied = Vec::new();
        for entry in metadata {
            // Capacity was checked above
            let _ = values.push(sanitise(entry, entry.default_value()));
            let _ = applied.push(false);
        }

        Ok(Self {
            metadata,
            values,
            applied,
            nvm,
            initialise_epilogue: None,
            defaults_epilogue: None,
        })
    }

    pub fn with_initialise_epilogue(mut self, epilogue: Epilogue<N>) -> Self {
        self.initialise_epilogue = Some(epilogue);
        self
    }

    pub fn with_defaults_epilogue(mut self, epilogue: Epilogue<N>) -> Self {
        self.defaults_epilogue = Some(epilogue);
        self
    }

    /// Loads the raw block from NVM, or erased flash when there is none,
    /// and sanitises every entry.
    pub fn initialise(&mut self) {
        let size = self.block_size();
        let mut block = [0xFFu8; SETTINGS_BLOCK_SIZE];
        if let Some(nvm) = self.nvm.as_mut() {
            nvm.read(&mut block[..size]);
        }

        let mut offset = 0;
        for (entry, value) in self.metadata.iter().zip(self.values.iter_mut()) {
            let raw = &block[offset..offset + entry.size()];
            *value = decode(entry, raw);
            offset += entry.size();
        }
        info!("Settings initialised ({} entries, {} bytes)", self.len(), size);

        if let Some(epilogue) = self.initialise_epilogue {
            epilogue(self);
        }
    }

    /// Restores compiled-in defaults. Preserved entries are kept unless
    /// `overwrite_preserved` is set.
    pub fn defaults(&mut self, overwrite_preserved: bool) {
        for (index, entry) in self.metadata.iter().enumerate() {
            if entry.preserved && !overwrite_preserved {
                continue;
            }
            // Index and type come from the table itself
            let _ = self.set(index, entry.default_value(), true);
        }
        info!("Settings defaults restored (preserved overwritten: {})", overwrite_preserved);

        if let Some(epilogue) = self.defaults_epilogue {
            epilogue(self);
        }
    }

    /// Writes one setting.
    ///
    /// Writes that store the same value as the current one, after
    /// sanitising, never clear the applied flag. Floats that are NaN or
    /// infinite are replaced by the entry's default; strings are truncated
    /// to the entry width and non-printable bytes become `?`.
    pub fn set(
        &mut self,
        index: usize,
        value: Value<'_>,
        override_read_only: bool,
    ) -> SettingsResult<SetOutcome> {
        let entry = self
            .metadata
            .get(index)
            .ok_or(SettingsError::IndexOutOfRange { index })?;
        if entry.value_type() != value.value_type() {
            return Err(SettingsError::TypeMismatch { index });
        }

        if entry.read_only && !override_read_only {
            debug!("Setting {} is read-only", entry.key);
            return Ok(SetOutcome::ReadOnly);
        }

        // Compared after sanitising, so text that stores the same is unchanged
        let value = sanitise(entry, value);
        if is_identical(&self.values[index], &value) {
            return Ok(SetOutcome::Unchanged);
        }

        self.applied[index] = false;
        self.values[index] = value;
        Ok(SetOutcome::Changed)
    }

    /// Flushes the raw block to NVM. Without NVM this does nothing.
    pub fn save(&mut self) {
        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        let size = self.encode(&mut block);
        if let Some(nvm) = self.nvm.as_mut() {
            nvm.write(&block[..size]);
            info!("Settings saved ({} bytes)", size);
        }
    }

    /// Returns true if the setting changed since the last call, marking it
    /// applied.
    pub fn apply_pending(&mut self, index: usize) -> bool {
        match self.applied.get_mut(index) {
            Some(applied) => !core::mem::replace(applied, true),
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<Value<'_>> {
        self.values.get(index).map(SettingValue::as_value)
    }

    pub fn get_bool(&self, index: usize) -> Option<bool> {
        match self.values.get(index)? {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_u32(&self, index: usize) -> Option<u32> {
        match self.values.get(index)? {
            SettingValue::U32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_f32(&self, index: usize) -> Option<f32> {
        match self.values.get(index)? {
            SettingValue::F32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.values.get(index)? {
            SettingValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn metadata(&self) -> &'static [SettingMetadata] {
        self.metadata
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Size of the raw block in bytes.
    pub fn block_size(&self) -> usize {
        self.metadata.iter().map(SettingMetadata::size).sum()
    }

    /// Serialises the raw block into `block`, returning its size.
    pub fn encode(&self, block: &mut [u8; SETTINGS_BLOCK_SIZE]) -> usize {
        let mut offset = 0;
        for (entry, value) in self.metadata.iter().zip(self.values.iter()) {
            let raw = &mut block[offset..offset + entry.size()];
            match value {
                SettingValue::Bool(value) => raw[0] = u8::from(*value),
                SettingValue::U32(value) => raw.copy_from_slice(&value.to_le_bytes()),
                SettingValue::F32(value) => raw.copy_from_slice(&value.to_le_bytes()),
                SettingValue::String(value) => {
                    raw.fill(0);
                    raw[..value.len()].copy_from_slice(value.as_bytes());
                }
            }
            offset += entry.size();
        }
        offset
    }

    pub fn nvm_mut(&mut self) -> Option<&mut N> {
        self.nvm.as_mut()
    }
}

fn is_identical(current: &SettingValue, value: &SettingValue) -> bool {
    match (current, value) {
        (SettingValue::F32(a), SettingValue::F32(b)) => a.to_bits() == b.to_bits(),
        _ => current == value,
    }
}

/// Maps an arbitrary value into the entry's valid domain.
fn sanitise(entry: &SettingMetadata, value: Value<'_>) -> SettingValue {
    match (value, entry.default) {
        (Value::Bool(value), _) => SettingValue::Bool(value),
        (Value::U32(value), _) => SettingValue::U32(value),
        (Value::F32(value), DefaultValue::F32(default)) => {
            if value.is_finite() {
                SettingValue::F32(value)
            } else {
                SettingValue::F32(default)
            }
        }
        (Value::String(bytes), DefaultValue::String { size, .. }) => {
            SettingValue::String(copy_string(bytes, size))
        }
        // Mismatched pairs are rejected before reaching here
        (_, _) => sanitise(entry, entry.default_value()),
    }
}

/// Copies up to `size - 1` bytes, stopping at NUL and replacing
/// non-printable bytes with `?`.
fn copy_string(bytes: &[u8], size: usize) -> heapless::String<STRING_SETTING_SIZE> {
    let mut string = heapless::String::new();
    for &byte in bytes.iter().take(size.saturating_sub(1)) {
        if byte == 0 {
            break;
        }
        let c = if (0x20..=0x7E).contains(&byte) { byte as char } else { '?' };
        if string.push(c).is_err() {
            break;
        }
    }
    string
}

fn decode(entry: &SettingMetadata, raw: &[u8]) -> SettingValue {
    match entry.default {
        DefaultValue::Bool(default) => SettingValue::Bool(match raw[0] {
            0 => false,
            1 => true,
            _ => default,
        }),
        DefaultValue::U32(_) => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(raw);
            SettingValue::U32(u32::from_le_bytes(bytes))
        }
        DefaultValue::F32(_) => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(raw);
            sanitise(entry, Value::F32(f32::from_le_bytes(bytes)))
        }
        DefaultValue::String { .. } => sanitise(entry, Value::String(raw)),
    }
}
