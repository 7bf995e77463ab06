//! mpsc-backed transport
//!
//! Writes are handed to a link task over a bounded channel; the task owns
//! the actual radio (or emulator) and reports completions back to the
//! session as [`TransportEvent::WriteComplete`](super::TransportEvent).

use tokio::sync::mpsc;
use tracing::trace;

use super::Transport;
use crate::error::{DashLinkError, Result};
use crate::protocol::OutboundFrame;

/// At most one write is in flight per channel, so a handful of slots is plenty
pub const WRITE_CHANNEL_CAPACITY: usize = 8;

/// Transport that forwards frames to a link task
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    frames: mpsc::Sender<OutboundFrame>,
}

impl ChannelTransport {
    /// Create the transport and the receiver the link task reads from
    pub fn new() -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (frames, rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        (Self { frames }, rx)
    }
}

impl Transport for ChannelTransport {
    fn write(&mut self, frame: OutboundFrame) -> Result<()> {
        let channel = frame.channel();
        let len = frame.len();
        self.frames.try_send(frame).map_err(|e| {
            DashLinkError::Transport(format!("Failed to hand {} frame to link task: {}", channel, e))
        })?;
        trace!("Queued {} byte write on {}", len, channel);
        Ok(())
    }
}
