//! # Transport Module
//!
//! The boundary between the protocol core and whatever BLE stack carries it.
//!
//! This module handles:
//! - The [`Transport`] write trait the session drives
//! - The [`TransportEvent`] stream the session consumes
//! - An mpsc-backed transport shared by the bench bridge and the radio binding
//! - Recording mocks for tests
//!
//! Radio scanning and GATT itself live outside the core; a binding only has
//! to accept fire-and-forget writes and report lifecycle, completion and
//! notification events back through one entry point.

pub mod bench;
#[cfg(feature = "ble")]
pub mod ble;
pub mod channel;

pub use channel::ChannelTransport;

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{Channel, OutboundFrame};

/// Write side of a BLE link
///
/// `write` hands one frame to the stack and returns immediately. Delivery
/// is reported later as [`TransportEvent::WriteComplete`]. An `Err` means
/// the stack rejected the write outright (characteristic missing, link
/// gone) and no completion will follow.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Issue a write-without-response on the frame's channel
    fn write(&mut self, frame: OutboundFrame) -> Result<()>;
}

/// Everything the transport reports back to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection attempt has started
    Connecting,
    /// Link-level connection established, service discovery pending
    Connected,
    /// Service discovery finished with these characteristics present
    ServicesResolved(Vec<Channel>),
    /// ATT MTU negotiated
    MtuChanged(u16),
    /// Link lost or closed, from any state
    Disconnected,
    /// The stack finished the outstanding write on a channel
    WriteComplete(Channel),
    /// Notification payload received on a channel
    Notification(Channel, Bytes),
}
