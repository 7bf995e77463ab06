//! # Bridge Protocol Types
//!
//! Typed values carried by the wire formats.

use bytes::Bytes;

use super::constants::Channel;

/// Opaque ECU variable identifier, assigned by the ECU firmware
pub type VariableHash = i32;

/// A single telemetry reading decoded from a variable-data notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableSample {
    /// Variable identifier
    pub hash: VariableHash,

    /// Current value reported by the ECU
    pub value: f32,
}

impl VariableSample {
    /// Create a new sample
    pub fn new(hash: VariableHash, value: f32) -> Self {
        Self { hash, value }
    }
}

/// A `[hash][f32]` pair written to the GPS channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsEntry {
    /// Target variable on the ECU
    pub hash: VariableHash,

    /// Value to set
    pub value: f32,
}

impl GpsEntry {
    /// Create a new GPS entry
    pub fn new(hash: VariableHash, value: f32) -> Self {
        Self { hash, value }
    }
}

/// One encoded payload bound for a single channel write
///
/// Frames are immutable once built; the write queue owns them until the
/// transport takes the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    channel: Channel,
    payload: Bytes,
}

impl OutboundFrame {
    /// Create a new frame
    ///
    /// # Arguments
    ///
    /// * `channel` - Target channel
    /// * `payload` - Encoded bytes
    pub fn new(channel: Channel, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Target channel
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Encoded payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the frame, returning its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
