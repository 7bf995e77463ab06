//! # Bridge Payload Decoder
//!
//! Decodes variable-data notifications from the bridge, plus the
//! app-to-bridge payloads (used by the bench bridge to emulate firmware).

use bytes::Buf;

use super::constants::*;
use super::types::{VariableHash, VariableSample};
use crate::error::{DashLinkError, Result};

/// Raw `[hash][word]` entry from a GPS channel write
///
/// The word is either an IEEE-754 float or a packed integer depending on
/// the hash; the receiver decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsWord {
    pub hash: VariableHash,
    pub raw: u32,
}

impl GpsWord {
    /// Interpret the word as a big-endian float
    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.raw)
    }
}

/// Decode a variable-data notification
///
/// The payload is a sequence of 8-byte `[hash: i32 BE][value: f32 BE]`
/// records. Trailing bytes that do not complete a record are ignored.
///
/// # Examples
///
/// ```
/// use dashlink::protocol::decoder::decode_variable_batch;
///
/// let samples = decode_variable_batch(&[0, 0, 0, 0x64, 0x42, 0xC8, 0, 0, 0xAA]);
/// assert_eq!(samples.len(), 1);
/// assert_eq!(samples[0].hash, 100);
/// assert_eq!(samples[0].value, 100.0);
/// ```
pub fn decode_variable_batch(payload: &[u8]) -> Vec<VariableSample> {
    payload
        .chunks_exact(VAR_RECORD_LEN)
        .map(|mut record| {
            let hash = record.get_i32();
            let value = record.get_f32();
            VariableSample::new(hash, value)
        })
        .collect()
}

/// Decode a variable request payload into its hashes
///
/// Trailing bytes that do not complete a hash are ignored, as the firmware
/// does.
pub fn decode_variable_request_batch(payload: &[u8]) -> Vec<VariableHash> {
    payload
        .chunks_exact(VAR_REQUEST_ENTRY_LEN)
        .map(|mut entry| entry.get_i32())
        .collect()
}

/// Decode a GPS channel write into raw entries
pub fn decode_gps_batch(payload: &[u8]) -> Vec<GpsWord> {
    payload
        .chunks_exact(VAR_RECORD_LEN)
        .map(|mut record| GpsWord {
            hash: record.get_i32(),
            raw: record.get_u32(),
        })
        .collect()
}

/// Decode a button mask payload
///
/// # Errors
///
/// Returns error if the payload is not exactly 2 bytes
pub fn decode_button_mask(payload: &[u8]) -> Result<u16> {
    if payload.len() != BUTTON_PAYLOAD_LEN {
        return Err(DashLinkError::Protocol(format!(
            "Button payload must be {} bytes, got {}",
            BUTTON_PAYLOAD_LEN,
            payload.len()
        )));
    }

    Ok(u16::from_le_bytes([payload[0], payload[1]]))
}
