//! # GPS Fix
//!
//! A resolved location reading as delivered by the platform location
//! service, plus the integer fields derived from it for the packed words.

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::change_filter::GpsChannel;
use crate::protocol::encoder::{pack_hmsd, pack_myqsat};

/// Accuracy (meters) below which a fix counts as a GPS fix
const FIX_QUALITY_ACCURACY_M: f32 = 100.0;

/// Lower bound on the satellite estimate once accuracy is known
const MIN_SATELLITE_ESTIMATE: u32 = 4;

/// One location update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    /// Ground speed in m/s
    pub speed_mps: f32,

    /// Latitude in degrees
    pub latitude_deg: f64,

    /// Longitude in degrees
    pub longitude_deg: f64,

    /// Altitude in meters, when the platform reports one
    pub altitude_m: Option<f32>,

    /// Course over ground in degrees, when available
    pub course_deg: Option<f32>,

    /// Horizontal accuracy radius in meters, when available
    pub accuracy_m: Option<f32>,

    /// Local wall-clock time of the fix
    pub timestamp: NaiveDateTime,
}

/// Calendar fields taken from the fix timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub day: u32,
    /// 1-based month
    pub month: u32,
    /// Two-digit year
    pub year: u32,
}

impl GpsFix {
    /// Create a fix with the mandatory fields
    pub fn new(latitude_deg: f64, longitude_deg: f64, speed_mps: f32, timestamp: NaiveDateTime) -> Self {
        Self {
            speed_mps,
            latitude_deg,
            longitude_deg,
            altitude_m: None,
            course_deg: None,
            accuracy_m: None,
            timestamp,
        }
    }

    /// Set the altitude, narrowed to the precision carried on the wire
    #[must_use]
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m as f32);
        self
    }

    #[must_use]
    pub fn with_course(mut self, course_deg: f32) -> Self {
        self.course_deg = Some(course_deg);
        self
    }

    #[must_use]
    pub fn with_accuracy(mut self, accuracy_m: f32) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Calendar fields of the fix timestamp
    pub fn calendar(&self) -> CalendarFields {
        let ts = &self.timestamp;
        CalendarFields {
            hour: ts.hour(),
            minute: ts.minute(),
            second: ts.second(),
            day: ts.day(),
            month: ts.month(),
            year: ts.year().rem_euclid(100) as u32,
        }
    }

    /// 1 when accuracy is known and under 100 m, otherwise 0
    pub fn fix_quality(&self) -> u32 {
        match self.accuracy_m {
            Some(accuracy) if accuracy < FIX_QUALITY_ACCURACY_M => 1,
            _ => 0,
        }
    }

    /// Rough satellite count derived from accuracy
    ///
    /// Phones do not expose the satellites used in a fix, so the ECU gets
    /// `max(4, 100 / max(1, accuracy))`, or 0 without an accuracy.
    pub fn satellite_estimate(&self) -> u32 {
        match self.accuracy_m {
            Some(accuracy) => {
                let estimate = (100.0 / accuracy.max(1.0)) as u32;
                estimate.max(MIN_SATELLITE_ESTIMATE)
            }
            None => 0,
        }
    }

    /// Packed hours/minutes/seconds/day word
    pub fn hmsd_packed(&self) -> u32 {
        let cal = self.calendar();
        pack_hmsd(cal.hour, cal.minute, cal.second, cal.day)
    }

    /// Packed month/year/quality/satellites word
    pub fn myqsat_packed(&self) -> u32 {
        let cal = self.calendar();
        pack_myqsat(cal.month, cal.year, self.fix_quality(), self.satellite_estimate())
    }

    /// Float readings present in this fix, in transmission order
    ///
    /// Speed, latitude and longitude are always present; altitude, course
    /// and accuracy only when the platform supplied them.
    pub fn scalar_readings(&self) -> Vec<(GpsChannel, f64)> {
        let mut readings = vec![
            (GpsChannel::Speed, self.speed_mps as f64),
            (GpsChannel::Latitude, self.latitude_deg),
            (GpsChannel::Longitude, self.longitude_deg),
        ];

        if let Some(altitude) = self.altitude_m {
            readings.push((GpsChannel::Altitude, altitude as f64));
        }
        if let Some(course) = self.course_deg {
            readings.push((GpsChannel::Course, course as f64));
        }
        if let Some(accuracy) = self.accuracy_m {
            readings.push((GpsChannel::Accuracy, accuracy as f64));
        }

        readings
    }
}
