//! # Write Queue
//!
//! Serializes writes to one characteristic. The BLE stack allows a single
//! outstanding operation per characteristic, so frames wait here until the
//! previous write completes.
//!
//! ## Guarantees
//!
//! - At most one frame is in flight at a time
//! - Frames are written in enqueue order, never duplicated
//! - Frames are only discarded by [`WriteQueue::clear`] (disconnect) or when
//!   the transport rejects the write synchronously
//!
//! ## Usage
//!
//! ```
//! use dashlink::protocol::{Channel, OutboundFrame};
//! use dashlink::session::WriteQueue;
//! use dashlink::transport::ChannelTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut transport, mut rx) = ChannelTransport::new();
//! let mut queue = WriteQueue::new(Channel::Button);
//!
//! queue.enqueue(OutboundFrame::new(Channel::Button, vec![1, 0]), &mut transport);
//! queue.enqueue(OutboundFrame::new(Channel::Button, vec![0, 0]), &mut transport);
//! assert!(queue.is_in_flight());
//! assert_eq!(queue.len(), 1);
//!
//! // Transport reports completion; the next frame goes out
//! queue.on_write_complete(&mut transport);
//! assert_eq!(queue.len(), 0);
//! # assert!(rx.recv().await.is_some());
//! # }
//! ```

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::protocol::{Channel, OutboundFrame};
use crate::transport::Transport;

/// FIFO of frames for one channel with a single in-flight guard
#[derive(Debug)]
pub struct WriteQueue {
    channel: Channel,
    pending: VecDeque<OutboundFrame>,
    in_flight: bool,
}

impl WriteQueue {
    /// Create an empty queue for `channel`
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            pending: VecDeque::new(),
            in_flight: false,
        }
    }

    /// Channel served by this queue
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Number of frames waiting (excluding the one in flight)
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a write has been issued and not yet completed
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Append a frame and start writing if the channel is idle
    ///
    /// Returns the number of frames dropped because the transport rejected
    /// them.
    pub fn enqueue<T: Transport + ?Sized>(&mut self, frame: OutboundFrame, transport: &mut T) -> usize {
        debug_assert_eq!(frame.channel(), self.channel, "frame routed to wrong queue");
        self.pending.push_back(frame);

        if self.in_flight {
            return 0;
        }
        self.drain(transport)
    }

    /// Issue the next write if the channel is idle
    ///
    /// A frame the transport rejects is dropped and the next one is tried,
    /// so a failed write never leaves the queue stuck. Returns the number
    /// of frames dropped.
    pub fn drain<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut dropped = 0;

        while !self.in_flight {
            let Some(frame) = self.pending.pop_front() else {
                break;
            };

            let len = frame.len();
            self.in_flight = true;
            match transport.write(frame) {
                Ok(()) => {
                    debug!("Wrote {} bytes on {} ({} pending)", len, self.channel, self.pending.len());
                }
                Err(e) => {
                    self.in_flight = false;
                    dropped += 1;
                    warn!("Dropped {} byte frame on {}: {}", len, self.channel, e);
                }
            }
        }

        dropped
    }

    /// The transport finished the outstanding write; continue with the next frame
    pub fn on_write_complete<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        if !self.in_flight {
            debug!("Write completion on idle {} queue", self.channel);
        }
        self.in_flight = false;
        self.drain(transport)
    }

    /// Discard every pending frame and forget the in-flight write
    ///
    /// Returns how many pending frames were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.in_flight = false;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashLinkError;
    use crate::transport::mocks::RecordingTransport;
    use crate::transport::MockTransport;

    fn frame(tag: u8) -> OutboundFrame {
        OutboundFrame::new(Channel::VariableRequest, vec![0, 0, 0, tag])
    }

    fn tags(frames: &[OutboundFrame]) -> Vec<u8> {
        frames.iter().map(|f| f.payload()[3]).collect()
    }

    #[test]
    fn test_first_enqueue_writes_immediately() {
        let mut transport = RecordingTransport::new();
        let mut queue = WriteQueue::new(Channel::VariableRequest);

        assert_eq!(queue.enqueue(frame(1), &mut transport), 0);

        assert_eq!(tags(&transport.written()), vec![1]);
        assert!(queue.is_in_flight());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_one_write_per_completion() {
        let mut transport = RecordingTransport::new();
        let mut queue = WriteQueue::new(Channel::VariableRequest);

        queue.enqueue(frame(1), &mut transport);
        queue.enqueue(frame(2), &mut transport);
        queue.enqueue(frame(3), &mut transport);
        assert_eq!(tags(&transport.written()), vec![1]);

        queue.on_write_complete(&mut transport);
        assert_eq!(tags(&transport.written()), vec![1, 2]);

        queue.on_write_complete(&mut transport);
        assert_eq!(tags(&transport.written()), vec![1, 2, 3]);

        queue.on_write_complete(&mut transport);
        assert_eq!(tags(&transport.written()), vec![1, 2, 3]);
        assert!(!queue.is_in_flight());
    }

    #[test]
    fn test_no_second_write_before_completion() {
        let mut transport = MockTransport::new();
        transport.expect_write().times(1).returning(|_| Ok(()));

        let mut queue = WriteQueue::new(Channel::VariableRequest);
        queue.enqueue(frame(1), &mut transport);
        queue.enqueue(frame(2), &mut transport);

        assert_eq!(queue.len(), 1);
        assert!(queue.is_in_flight());
    }

    #[test]
    fn test_sync_failure_unblocks_queue() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DashLinkError::Transport("characteristic not resolved".into())));
        transport
            .expect_write()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut queue = WriteQueue::new(Channel::VariableRequest);
        assert_eq!(queue.enqueue(frame(1), &mut transport), 1);
        assert!(!queue.is_in_flight());

        // Next enqueue goes straight out instead of waiting on a dead write
        assert_eq!(queue.enqueue(frame(2), &mut transport), 0);
        assert!(queue.is_in_flight());
    }

    #[test]
    fn test_failed_write_moves_on_to_next_frame() {
        let mut transport = RecordingTransport::new();
        let mut queue = WriteQueue::new(Channel::VariableRequest);

        queue.enqueue(frame(1), &mut transport);
        queue.enqueue(frame(2), &mut transport);
        queue.enqueue(frame(3), &mut transport);

        transport.set_fail_writes(true);
        let dropped = queue.on_write_complete(&mut transport);

        assert_eq!(dropped, 2);
        assert!(queue.is_empty());
        assert!(!queue.is_in_flight());
        assert_eq!(tags(&transport.written()), vec![1]);
    }

    #[test]
    fn test_clear_discards_pending_and_in_flight() {
        let mut transport = RecordingTransport::new();
        let mut queue = WriteQueue::new(Channel::VariableRequest);

        queue.enqueue(frame(1), &mut transport);
        queue.enqueue(frame(2), &mut transport);
        queue.enqueue(frame(3), &mut transport);

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(!queue.is_in_flight());

        // A late completion for the abandoned write writes nothing stale
        queue.on_write_complete(&mut transport);
        assert_eq!(tags(&transport.written()), vec![1]);
    }

    #[test]
    fn test_spurious_completion_is_harmless() {
        let mut transport = RecordingTransport::new();
        let mut queue = WriteQueue::new(Channel::VariableRequest);

        assert_eq!(queue.on_write_complete(&mut transport), 0);
        assert!(transport.written().is_empty());
    }
}
