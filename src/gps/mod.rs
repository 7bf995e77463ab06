//! # GPS Relay Module
//!
//! Location fixes relayed from the phone to the ECU.
//!
//! This module handles:
//! - The fix type consumed from the platform location service
//! - Derived calendar and fix-quality fields for the packed words
//! - Per-channel change detection so unchanged readings are not resent

pub mod fix;
pub mod change_filter;

pub use change_filter::{ChangeFilter, GpsChannel};
pub use fix::GpsFix;
