//! # Bridge Wire Protocol Module
//!
//! Fixed binary formats exchanged with the ESP32 CAN bridge over BLE.
//!
//! This module handles:
//! - Service and characteristic UUIDs (firmware contract)
//! - Button mask, variable request and GPS entry encoding
//! - Variable batch decoding from notifications
//! - Packing of GPS time and fix-quality sub-fields
//!
//! All multi-byte fields are big-endian except the 2-byte button mask,
//! which the firmware reads low byte first.

pub mod constants;
pub mod types;
pub mod encoder;
pub mod decoder;

pub use constants::Channel;
pub use types::{GpsEntry, OutboundFrame, VariableHash, VariableSample};
