//! # DashLink Library
//!
//! Telemetry link between a dashboard and an ESP32 CAN bridge over BLE.
//!
//! This library provides the protocol core: the fixed binary codecs for each
//! characteristic, per-characteristic write serialization, the connection
//! state machine, GPS change filtering and periodic gauge polling. Radio
//! access sits behind the [`transport::Transport`] trait.

pub mod config;
pub mod error;
pub mod gps;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use error::{DashLinkError, Result};
