//! Hardware-independent core library for thermolink
//!
//! This crate contains the protocol stack of the thermolink USB thermometer:
//! a streaming JSON cursor parser, fuzzy key matching, the newline-framed
//! command bridge, a typed settings store with its JSON view, and the
//! binary/ASCII telemetry codec. The [`device`] module ties them to the
//! TMP117 thermometer, the indicator LED and the timestamp.
//!
//! It is `#![no_std]` and allocation-free, so it runs on the firmware target
//! and on desktop hosts (for the simulator and tests) alike.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod command;
pub mod config;
pub mod data;
pub mod device;
pub mod json;
pub mod key;
pub mod settings;

#[cfg(test)]
mod mock;
