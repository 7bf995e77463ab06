//! # Bench Bridge
//!
//! In-process stand-in for the ESP32 bridge firmware, for running the
//! dashboard and its tests without a radio.
//!
//! The bench bridge consumes frames from a [`ChannelTransport`](super::ChannelTransport),
//! acknowledges every write, and answers variable requests the way the
//! firmware does: the first [`MAX_BATCH_VARS`] hashes of a request are
//! looked up and returned together as `[hash][f32]` records on the
//! variable-data channel. Values are synthetic but stable per hash, with a
//! slow sine wobble so gauges visibly move.

use std::f32::consts::TAU;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::TransportEvent;
use crate::error::Result;
use crate::gps::GpsFix;
use crate::protocol::constants::{ATT_HEADER_LEN, MAX_BATCH_VARS, VAR_RECORD_LEN};
use crate::protocol::{decoder, encoder};
use crate::protocol::{Channel, OutboundFrame, VariableHash, VariableSample};
use crate::session::SessionHandle;

/// Emulated bridge firmware
pub struct BenchBridge {
    frames: mpsc::Receiver<OutboundFrame>,
    session: SessionHandle,
    mtu: u16,
    started: Instant,
    requests_served: u64,
}

impl BenchBridge {
    /// Create a bench bridge reading frames from `frames`
    ///
    /// # Arguments
    ///
    /// * `frames` - Receiver half of the session's transport
    /// * `session` - Where lifecycle events, completions and notifications go
    /// * `mtu` - ATT MTU the emulated link reports after connecting
    pub fn new(frames: mpsc::Receiver<OutboundFrame>, session: SessionHandle, mtu: u16) -> Self {
        Self {
            frames,
            session,
            mtu,
            started: Instant::now(),
            requests_served: 0,
        }
    }

    /// Bring the emulated link up and serve frames until cancelled
    ///
    /// A `Disconnected` event is reported on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`DashLinkError::SessionClosed`](crate::error::DashLinkError::SessionClosed)
    /// if the session task goes away while the link is up.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        self.session.dispatch(TransportEvent::Connecting)?;
        self.session.dispatch(TransportEvent::Connected)?;
        self.session
            .dispatch(TransportEvent::ServicesResolved(Channel::ALL.to_vec()))?;
        self.session.dispatch(TransportEvent::MtuChanged(self.mtu))?;
        info!("Bench bridge up (MTU {})", self.mtu);

        let result = loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                frame = self.frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break Ok(()),
                },
            };

            if let Err(e) = self.handle_frame(frame) {
                break Err(e);
            }
        };

        let _ = self.session.dispatch(TransportEvent::Disconnected);
        info!("Bench bridge down after {} requests", self.requests_served);
        result
    }

    fn handle_frame(&mut self, frame: OutboundFrame) -> Result<()> {
        let channel = frame.channel();
        let payload = frame.into_payload();

        let response = match channel {
            Channel::Button => {
                match decoder::decode_button_mask(&payload) {
                    Ok(mask) => debug!("Button mask {:#06x}", mask),
                    Err(e) => warn!("Bad button frame: {}", e),
                }
                None
            }
            Channel::GpsData => {
                for word in decoder::decode_gps_batch(&payload) {
                    debug!("ECU set {} = {:#010x}", word.hash, word.raw);
                }
                None
            }
            Channel::VariableRequest => {
                let hashes = decoder::decode_variable_request_batch(&payload);
                Some(self.lookup(&hashes))
            }
            Channel::VariableData => {
                warn!("Write on notify-only channel ignored");
                None
            }
        };

        self.session.dispatch(TransportEvent::WriteComplete(channel))?;

        if let Some(samples) = response {
            self.requests_served += 1;
            let per_notification = ((self.mtu as usize).saturating_sub(ATT_HEADER_LEN) / VAR_RECORD_LEN).max(1);
            for chunk in samples.chunks(per_notification) {
                let payload = encoder::encode_variable_batch(chunk);
                self.session
                    .dispatch(TransportEvent::Notification(Channel::VariableData, payload))?;
            }
        }
        Ok(())
    }

    fn lookup(&self, hashes: &[VariableHash]) -> Vec<VariableSample> {
        if hashes.len() > MAX_BATCH_VARS {
            debug!("Request of {} hashes truncated to {}", hashes.len(), MAX_BATCH_VARS);
        }

        let elapsed = self.started.elapsed();
        hashes
            .iter()
            .take(MAX_BATCH_VARS)
            .map(|&hash| {
                let value = synthetic_value(hash, elapsed);
                trace!("{} -> {}", hash, value);
                VariableSample::new(hash, value)
            })
            .collect()
    }
}

/// Stable per-hash value with a slow oscillation
pub fn synthetic_value(hash: VariableHash, elapsed: Duration) -> f32 {
    let base = (hash.unsigned_abs() % 1000) as f32 / 10.0;
    let phase = (hash.unsigned_abs() % 360) as f32 / 360.0;
    let wobble = (TAU * (elapsed.as_secs_f32() / 10.0 + phase)).sin();
    base + wobble
}

/// Fake location moving around a 100 m loop, for bench runs
pub fn simulated_fix(elapsed: Duration, timestamp: NaiveDateTime) -> GpsFix {
    const ORIGIN_LAT: f64 = 48.137;
    const ORIGIN_LON: f64 = 11.575;
    const RADIUS_DEG: f64 = 0.0009;
    const LAP_SECS: f64 = 60.0;

    let angle = std::f64::consts::TAU * (elapsed.as_secs_f64() % LAP_SECS) / LAP_SECS;
    GpsFix::new(
        ORIGIN_LAT + RADIUS_DEG * angle.sin(),
        ORIGIN_LON + RADIUS_DEG * angle.cos(),
        10.5,
        timestamp,
    )
    .with_altitude(520.0)
    .with_course(angle.to_degrees() as f32)
    .with_accuracy(5.0)
}
