//! # Session Module
//!
//! The queued, single-owner protocol state machine for one bridge link.
//!
//! This module handles:
//! - Per-channel write serialization ([`WriteQueue`])
//! - Connection lifecycle and send gating ([`TelemetrySession`])
//! - Running a session on its own task ([`SessionDriver`])
//! - Periodic gauge polling ([`PollingLoop`])

pub mod driver;
pub mod polling;
pub mod queue;
pub mod state;
pub mod telemetry;

pub use driver::{SessionCommand, SessionDriver, SessionHandle};
pub use polling::{GaugeSet, PollingLoop};
pub use queue::WriteQueue;
pub use state::ConnectionState;
pub use telemetry::{SessionLimits, SessionListener, SessionUpdate, TelemetrySession};
