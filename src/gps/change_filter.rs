//! # GPS Change Filter
//!
//! Remembers the last value sent on each GPS channel and suppresses
//! readings that are identical to it.
//!
//! Comparison is exact on the bit pattern of the stored `f64`. Any change,
//! including float rounding noise, is worth a send; there is no tolerance
//! band.
//!
//! ## Usage
//!
//! ```
//! use dashlink::gps::{ChangeFilter, GpsChannel};
//!
//! let mut filter = ChangeFilter::new();
//! assert!(filter.should_send(GpsChannel::Latitude, 10.0));
//! filter.commit(GpsChannel::Latitude, 10.0);
//! assert!(!filter.should_send(GpsChannel::Latitude, 10.0));
//! ```

use crate::protocol::constants::*;
use crate::protocol::VariableHash;

/// One of the GPS-derived values relayed to the ECU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpsChannel {
    Speed,
    Latitude,
    Longitude,
    Altitude,
    Course,
    Accuracy,
    /// Packed hours/minutes/seconds/day
    HmsdPacked,
    /// Packed month/year/quality/satellites
    MyqsatPacked,
}

impl GpsChannel {
    /// Number of GPS channels
    pub const COUNT: usize = 8;

    /// All channels, in slot order
    pub const ALL: [GpsChannel; Self::COUNT] = [
        GpsChannel::Speed,
        GpsChannel::Latitude,
        GpsChannel::Longitude,
        GpsChannel::Altitude,
        GpsChannel::Course,
        GpsChannel::Accuracy,
        GpsChannel::HmsdPacked,
        GpsChannel::MyqsatPacked,
    ];

    /// ECU variable hash this channel is written to
    pub fn hash(self) -> VariableHash {
        match self {
            GpsChannel::Speed => VAR_HASH_GPS_SPEED,
            GpsChannel::Latitude => VAR_HASH_GPS_LATITUDE,
            GpsChannel::Longitude => VAR_HASH_GPS_LONGITUDE,
            GpsChannel::Altitude => VAR_HASH_GPS_ALTITUDE,
            GpsChannel::Course => VAR_HASH_GPS_COURSE,
            GpsChannel::Accuracy => VAR_HASH_GPS_ACCURACY,
            GpsChannel::HmsdPacked => VAR_HASH_GPS_HMSD_PACKED,
            GpsChannel::MyqsatPacked => VAR_HASH_GPS_MYQSAT_PACKED,
        }
    }

    /// Whether the channel carries a packed integer rather than a float
    pub fn is_packed(self) -> bool {
        matches!(self, GpsChannel::HmsdPacked | GpsChannel::MyqsatPacked)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Last-sent markers for every GPS channel
///
/// Lives as long as one connection; [`ChangeFilter::reset`] on disconnect
/// so the first reading after a reconnect is always sent.
#[derive(Debug, Clone, Default)]
pub struct ChangeFilter {
    last_sent: [Option<u64>; GpsChannel::COUNT],
}

impl ChangeFilter {
    /// Create a filter with no history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `value` differs from the last committed value
    /// on `channel`, or nothing has been committed yet.
    pub fn should_send(&self, channel: GpsChannel, value: f64) -> bool {
        self.last_sent[channel.slot()] != Some(value.to_bits())
    }

    /// Record `value` as sent on `channel`
    ///
    /// Call exactly once for every reading accepted by [`ChangeFilter::should_send`].
    pub fn commit(&mut self, channel: GpsChannel, value: f64) {
        self.last_sent[channel.slot()] = Some(value.to_bits());
    }

    /// Check and commit in one step, returning whether the value should go out
    pub fn accept(&mut self, channel: GpsChannel, value: f64) -> bool {
        if self.should_send(channel, value) {
            self.commit(channel, value);
            true
        } else {
            false
        }
    }

    /// Last committed value on `channel`
    pub fn last_sent(&self, channel: GpsChannel) -> Option<f64> {
        self.last_sent[channel.slot()].map(f64::from_bits)
    }

    /// Forget every last-sent marker
    pub fn reset(&mut self) {
        self.last_sent = [None; GpsChannel::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_always_sent() {
        let filter = ChangeFilter::new();
        for channel in GpsChannel::ALL {
            assert!(filter.should_send(channel, 0.0), "{:?}", channel);
        }
    }

    #[test]
    fn test_suppresses_duplicates_not_first_value() {
        let mut filter = ChangeFilter::new();

        assert!(filter.should_send(GpsChannel::Latitude, 10.0));
        filter.commit(GpsChannel::Latitude, 10.0);
        assert!(!filter.should_send(GpsChannel::Latitude, 10.0));
        assert!(filter.should_send(GpsChannel::Latitude, 10.0001));

        filter.reset();
        assert!(filter.should_send(GpsChannel::Latitude, 10.0));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut filter = ChangeFilter::new();
        filter.commit(GpsChannel::Latitude, 10.0);

        assert!(filter.should_send(GpsChannel::Longitude, 10.0));
        assert_eq!(filter.last_sent(GpsChannel::Latitude), Some(10.0));
        assert_eq!(filter.last_sent(GpsChannel::Longitude), None);
    }

    #[test]
    fn test_exact_comparison_has_no_tolerance() {
        let mut filter = ChangeFilter::new();
        let value = 52.520_008_1_f64;
        filter.commit(GpsChannel::Latitude, value);

        // Smallest representable step is still a change
        let next = f64::from_bits(value.to_bits() + 1);
        assert!(filter.should_send(GpsChannel::Latitude, next));
    }

    #[test]
    fn test_accept_commits_once() {
        let mut filter = ChangeFilter::new();
        assert!(filter.accept(GpsChannel::Speed, 3.5));
        assert!(!filter.accept(GpsChannel::Speed, 3.5));
        assert!(filter.accept(GpsChannel::Speed, 3.75));
    }

    #[test]
    fn test_packed_values_round_trip_through_f64() {
        let mut filter = ChangeFilter::new();
        let packed = 0xFF00_0102u32;
        filter.commit(GpsChannel::HmsdPacked, packed as f64);
        assert!(!filter.should_send(GpsChannel::HmsdPacked, packed as f64));
        assert!(filter.should_send(GpsChannel::HmsdPacked, (packed + 1) as f64));
    }

    #[test]
    fn test_channel_hashes_and_kinds() {
        assert_eq!(GpsChannel::Latitude.hash(), VAR_HASH_GPS_LATITUDE);
        assert_eq!(GpsChannel::MyqsatPacked.hash(), VAR_HASH_GPS_MYQSAT_PACKED);
        assert!(GpsChannel::HmsdPacked.is_packed());
        assert!(!GpsChannel::Speed.is_packed());
    }
}
