//! # Bridge Payload Encoder
//!
//! Encodes button masks, variable requests and GPS entries into the byte
//! layouts the bridge firmware expects.

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::*;
use super::types::{GpsEntry, VariableHash, VariableSample};

/// Encode a button mask
///
/// The firmware reads this single field low byte first.
///
/// # Examples
///
/// ```
/// use dashlink::protocol::encoder::encode_button_mask;
///
/// assert_eq!(encode_button_mask(0x0102).as_ref(), &[0x02, 0x01]);
/// ```
pub fn encode_button_mask(mask: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(BUTTON_PAYLOAD_LEN);
    buf.put_u16_le(mask);
    buf.freeze()
}

/// Encode a single variable request (4 bytes, big-endian)
pub fn encode_variable_request(hash: VariableHash) -> Bytes {
    encode_variable_request_batch(&[hash])
}

/// Encode a batch of variable requests
///
/// Each hash is written big-endian, in input order.
///
/// # Examples
///
/// ```
/// use dashlink::protocol::encoder::encode_variable_request_batch;
///
/// let payload = encode_variable_request_batch(&[100, -200]);
/// assert_eq!(payload.as_ref(), &[0, 0, 0, 0x64, 0xFF, 0xFF, 0xFF, 0x38]);
/// ```
pub fn encode_variable_request_batch(hashes: &[VariableHash]) -> Bytes {
    let mut buf = BytesMut::with_capacity(hashes.len() * VAR_REQUEST_ENTRY_LEN);
    for &hash in hashes {
        buf.put_i32(hash);
    }
    buf.freeze()
}

/// Encode variable samples as the bridge sends them in notifications
///
/// Repeating `[hash: i32 BE][value: f32 BE]` records.
pub fn encode_variable_batch(samples: &[VariableSample]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * VAR_RECORD_LEN);
    for sample in samples {
        buf.put_i32(sample.hash);
        buf.put_f32(sample.value);
    }
    buf.freeze()
}

/// Encode one GPS entry: hash then IEEE-754 value, both big-endian
pub fn encode_gps_entry(hash: VariableHash, value: f32) -> Bytes {
    encode_gps_entry_batch(&[GpsEntry::new(hash, value)])
}

/// Encode several GPS entries into one payload, in input order
pub fn encode_gps_entry_batch(entries: &[GpsEntry]) -> Bytes {
    let mut buf = BytesMut::with_capacity(entries.len() * VAR_RECORD_LEN);
    for entry in entries {
        buf.put_i32(entry.hash);
        buf.put_f32(entry.value);
    }
    buf.freeze()
}

/// Encode a packed GPS field
///
/// The packed word is written as a raw big-endian integer, not
/// reinterpreted as a float.
pub fn encode_gps_packed(hash: VariableHash, packed: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(VAR_RECORD_LEN);
    buf.put_i32(hash);
    buf.put_u32(packed);
    buf.freeze()
}

/// Pack hours, minutes, seconds and day-of-month into one word
///
/// Layout: `hours | minutes << 8 | seconds << 16 | days << 24`. Each field
/// keeps only its low 8 bits; out-of-range inputs are truncated, not
/// rejected.
///
/// # Examples
///
/// ```
/// use dashlink::protocol::encoder::pack_hmsd;
///
/// assert_eq!(pack_hmsd(14, 30, 45, 5), 0x052D_1E0E);
/// ```
pub fn pack_hmsd(hours: u32, minutes: u32, seconds: u32, days: u32) -> u32 {
    pack_bytes(hours, minutes, seconds, days)
}

/// Pack month, two-digit year, fix quality and satellite count into one word
///
/// Same layout and truncation rules as [`pack_hmsd`].
pub fn pack_myqsat(months: u32, years: u32, quality: u32, satellites: u32) -> u32 {
    pack_bytes(months, years, quality, satellites)
}

fn pack_bytes(b0: u32, b1: u32, b2: u32, b3: u32) -> u32 {
    (b0 & 0xFF) | (b1 & 0xFF) << 8 | (b2 & 0xFF) << 16 | (b3 & 0xFF) << 24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_button_mask_low_byte_first() {
        assert_eq!(encode_button_mask(0).as_ref(), &[0x00, 0x00]);
        assert_eq!(encode_button_mask(0x0001).as_ref(), &[0x01, 0x00]);
        assert_eq!(encode_button_mask(0x8000).as_ref(), &[0x00, 0x80]);
        assert_eq!(encode_button_mask(0xABCD).as_ref(), &[0xCD, 0xAB]);
    }

    #[test]
    fn test_encode_variable_request_big_endian() {
        assert_eq!(encode_variable_request(100).as_ref(), &[0x00, 0x00, 0x00, 0x64]);
        assert_eq!(encode_variable_request(-200).as_ref(), &[0xFF, 0xFF, 0xFF, 0x38]);
    }

    #[test]
    fn test_encode_variable_request_batch() {
        let payload = encode_variable_request_batch(&[100, -200, 300]);
        assert_eq!(
            payload.as_ref(),
            &[0x00, 0x00, 0x00, 0x64, 0xFF, 0xFF, 0xFF, 0x38, 0x00, 0x00, 0x01, 0x2C]
        );
    }

    #[test]
    fn test_encode_variable_request_batch_empty() {
        assert!(encode_variable_request_batch(&[]).is_empty());
    }

    #[test]
    fn test_encode_variable_batch() {
        let payload = encode_variable_batch(&[VariableSample::new(100, 100.0)]);
        assert_eq!(payload.as_ref(), &[0x00, 0x00, 0x00, 0x64, 0x42, 0xC8, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_gps_entry() {
        // 1.0f32 = 0x3F800000
        let payload = encode_gps_entry(VAR_HASH_GPS_SPEED, 1.0);
        let mut expected = VAR_HASH_GPS_SPEED.to_be_bytes().to_vec();
        expected.extend_from_slice(&[0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(payload.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_encode_gps_entry_batch_keeps_order() {
        let entries = [
            GpsEntry::new(VAR_HASH_GPS_LATITUDE, 10.0),
            GpsEntry::new(VAR_HASH_GPS_LONGITUDE, -20.0),
        ];
        let payload = encode_gps_entry_batch(&entries);
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[0..4], &VAR_HASH_GPS_LATITUDE.to_be_bytes());
        assert_eq!(&payload[4..8], &10.0f32.to_be_bytes());
        assert_eq!(&payload[8..12], &VAR_HASH_GPS_LONGITUDE.to_be_bytes());
        assert_eq!(&payload[12..16], &(-20.0f32).to_be_bytes());
    }

    #[test]
    fn test_encode_gps_packed_is_raw_integer() {
        let payload = encode_gps_packed(VAR_HASH_GPS_HMSD_PACKED, 0x0102_0304);
        assert_eq!(&payload[0..4], &VAR_HASH_GPS_HMSD_PACKED.to_be_bytes());
        assert_eq!(&payload[4..8], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_pack_hmsd_layout() {
        let expected: u32 = 5 << 24 | 45 << 16 | 30 << 8 | 14;
        assert_eq!(pack_hmsd(14, 30, 45, 5), expected);
        assert_eq!(pack_hmsd(14, 30, 45, 5), 86_842_894);
    }

    #[test]
    fn test_pack_truncates_out_of_range_fields() {
        // 300 & 0xFF = 44
        assert_eq!(pack_hmsd(300, 0, 0, 0), 44);
        assert_eq!(pack_myqsat(0, 0, 0, 0x1FF), 0xFF00_0000);
    }

    #[test]
    fn test_pack_myqsat_layout() {
        // month 6, year 25, quality 1, 20 satellites
        assert_eq!(pack_myqsat(6, 25, 1, 20), 20 << 24 | 1 << 16 | 25 << 8 | 6);
    }
}
