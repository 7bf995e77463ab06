//! # Telemetry Session
//!
//! Top-level protocol object for one bridge connection. Owns the three
//! write queues, the GPS change filter and the connection state, and turns
//! UI intents into encoded frames.
//!
//! Every transport callback enters through
//! [`TelemetrySession::handle_transport_event`]; together with the public
//! send operations this is the only way the state changes. Every method
//! takes `&mut self`, so one task owns the session; see
//! [`SessionDriver`](super::SessionDriver).

use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::queue::WriteQueue;
use super::state::ConnectionState;
use crate::gps::{ChangeFilter, GpsChannel, GpsFix};
use crate::protocol::constants::{ATT_HEADER_LEN, DEFAULT_ATT_MTU, MAX_ATT_MTU, MAX_BATCH_VARS};
use crate::protocol::constants::{VAR_RECORD_LEN, VAR_REQUEST_ENTRY_LEN};
use crate::protocol::{decoder, encoder};
use crate::protocol::{Channel, GpsEntry, OutboundFrame, VariableHash, VariableSample};
use crate::transport::{Transport, TransportEvent};

/// Receives everything the session reports upward
#[cfg_attr(test, mockall::automock)]
pub trait SessionListener: Send {
    /// One decoded telemetry reading
    fn on_variable_sample(&mut self, sample: VariableSample);

    /// Ready was entered (`true`) or the link was lost (`false`)
    fn on_connectivity_changed(&mut self, connected: bool);

    /// Human-readable diagnostic line
    fn on_log_line(&mut self, _line: &str) {}
}

/// Session output as a message, for listeners living on another task
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Sample(VariableSample),
    Connectivity(bool),
    Log(String),
}

impl SessionListener for mpsc::UnboundedSender<SessionUpdate> {
    fn on_variable_sample(&mut self, sample: VariableSample) {
        let _ = self.send(SessionUpdate::Sample(sample));
    }

    fn on_connectivity_changed(&mut self, connected: bool) {
        let _ = self.send(SessionUpdate::Connectivity(connected));
    }

    fn on_log_line(&mut self, line: &str) {
        let _ = self.send(SessionUpdate::Log(line.to_string()));
    }
}

/// Size limits applied to outbound frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// ATT MTU assumed until the stack reports a negotiated one
    pub default_mtu: u16,
    /// Most hashes the bridge accepts in one request frame
    pub max_batch_vars: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            default_mtu: DEFAULT_ATT_MTU,
            max_batch_vars: MAX_BATCH_VARS,
        }
    }
}

impl SessionLimits {
    fn write_len_for(mtu: u16) -> usize {
        mtu.clamp(DEFAULT_ATT_MTU, MAX_ATT_MTU) as usize - ATT_HEADER_LEN
    }
}

/// Protocol state for one connection lifetime
pub struct TelemetrySession<T: Transport, L: SessionListener> {
    transport: T,
    listener: L,
    limits: SessionLimits,
    state: ConnectionState,
    resolved: HashSet<Channel>,
    button_queue: WriteQueue,
    request_queue: WriteQueue,
    gps_queue: WriteQueue,
    filter: ChangeFilter,
    max_write_len: usize,
}

impl<T: Transport, L: SessionListener> TelemetrySession<T, L> {
    /// Create a disconnected session with default limits
    pub fn new(transport: T, listener: L) -> Self {
        Self::with_limits(transport, listener, SessionLimits::default())
    }

    /// Create a disconnected session with explicit limits
    pub fn with_limits(transport: T, listener: L, limits: SessionLimits) -> Self {
        Self {
            transport,
            listener,
            limits,
            state: ConnectionState::Disconnected,
            resolved: HashSet::new(),
            button_queue: WriteQueue::new(Channel::Button),
            request_queue: WriteQueue::new(Channel::VariableRequest),
            gps_queue: WriteQueue::new(Channel::GpsData),
            filter: ChangeFilter::new(),
            max_write_len: SessionLimits::write_len_for(limits.default_mtu),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn change_filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Largest payload a single write may carry at the current MTU
    pub fn max_write_len(&self) -> usize {
        self.max_write_len
    }

    /// Queue serving a writable channel
    pub fn queue(&self, channel: Channel) -> Option<&WriteQueue> {
        match channel {
            Channel::Button => Some(&self.button_queue),
            Channel::VariableRequest => Some(&self.request_queue),
            Channel::GpsData => Some(&self.gps_queue),
            Channel::VariableData => None,
        }
    }

    /// Whether service discovery found `channel`
    pub fn is_resolved(&self, channel: Channel) -> bool {
        self.resolved.contains(&channel)
    }

    /// Single ingestion point for transport callbacks
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting => self.on_connect_attempt(),
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::ServicesResolved(channels) => self.on_services_resolved(&channels),
            TransportEvent::MtuChanged(mtu) => self.on_mtu_changed(mtu),
            TransportEvent::Disconnected => self.on_disconnected(),
            TransportEvent::WriteComplete(channel) => self.on_write_complete(channel),
            TransportEvent::Notification(channel, payload) => self.on_notification(channel, &payload),
        }
    }

    /// A connection attempt started
    pub fn on_connect_attempt(&mut self) {
        if self.state != ConnectionState::Disconnected {
            debug!("Connect attempt while {}", self.state);
        }
        self.transition(ConnectionState::Connecting);
    }

    /// Link-level connection established
    pub fn on_connected(&mut self) {
        self.transition(ConnectionState::ServiceDiscovery);
        self.log_line("Connected, discovering services");
    }

    /// Service discovery finished
    ///
    /// The session only becomes ready when the button characteristic is
    /// present. Other channels are optional; sends on a missing one are
    /// rejected.
    pub fn on_services_resolved(&mut self, channels: &[Channel]) {
        if self.state == ConnectionState::Disconnected {
            debug!("Ignoring service discovery result while disconnected");
            return;
        }

        self.resolved = channels.iter().copied().collect();
        for channel in Channel::ALL {
            if !self.resolved.contains(&channel) {
                warn!("Characteristic {} ({}) not found", channel, channel.uuid());
            }
        }

        if self.resolved.contains(&Channel::Button) {
            self.on_connection_ready();
        } else {
            self.log_line("Button characteristic missing, link not usable");
        }
    }

    /// Required characteristics are resolved; accept sends
    ///
    /// When no discovery result was reported, every channel is assumed
    /// present.
    pub fn on_connection_ready(&mut self) {
        if self.resolved.is_empty() {
            self.resolved = Channel::ALL.into_iter().collect();
        }

        let was_ready = self.state.is_ready();
        self.transition(ConnectionState::Ready);
        if !was_ready {
            self.log_line("Bridge ready");
            self.listener.on_connectivity_changed(true);
        }
    }

    /// ATT MTU negotiated; frames are sized to `mtu - 3`
    pub fn on_mtu_changed(&mut self, mtu: u16) {
        self.max_write_len = SessionLimits::write_len_for(mtu);
        debug!("MTU {} -> max write {} bytes", mtu, self.max_write_len);
    }

    /// Link lost from any state
    ///
    /// Pending and in-flight frames are abandoned and the change filter
    /// forgets everything, so the first fix after reconnecting goes out in
    /// full. The listener hears about it only when the bridge was ready.
    pub fn on_disconnected(&mut self) {
        let discarded =
            self.button_queue.clear() + self.request_queue.clear() + self.gps_queue.clear();
        if discarded > 0 {
            debug!("Discarded {} pending frames on disconnect", discarded);
        }

        self.filter.reset();
        self.resolved.clear();
        self.max_write_len = SessionLimits::write_len_for(self.limits.default_mtu);

        let was_ready = self.state.is_ready();
        self.transition(ConnectionState::Disconnected);
        self.log_line("Disconnected");
        if was_ready {
            self.listener.on_connectivity_changed(false);
        }
    }

    /// The transport finished the outstanding write on `channel`
    pub fn on_write_complete(&mut self, channel: Channel) {
        let queue = match channel {
            Channel::Button => &mut self.button_queue,
            Channel::VariableRequest => &mut self.request_queue,
            Channel::GpsData => &mut self.gps_queue,
            Channel::VariableData => {
                debug!("Write completion on notify-only channel");
                return;
            }
        };
        let dropped = queue.on_write_complete(&mut self.transport);
        self.report_dropped(channel, dropped);
    }

    /// Notification received; variable data is decoded and forwarded
    pub fn on_notification(&mut self, channel: Channel, payload: &[u8]) {
        if channel != Channel::VariableData {
            debug!("Ignoring {} byte notification on {}", payload.len(), channel);
            return;
        }

        if payload.len() % VAR_RECORD_LEN != 0 {
            debug!(
                "Variable batch of {} bytes, ignoring {} trailing",
                payload.len(),
                payload.len() % VAR_RECORD_LEN
            );
        }

        for sample in decoder::decode_variable_batch(payload) {
            self.listener.on_variable_sample(sample);
        }
    }

    /// Send the touch-button bitmask
    ///
    /// Returns `false` when the session is not ready.
    pub fn send_button_mask(&mut self, mask: u16) -> bool {
        if !self.can_send(Channel::Button) {
            return false;
        }
        self.enqueue(OutboundFrame::new(Channel::Button, encoder::encode_button_mask(mask)));
        true
    }

    /// Request a single variable
    pub fn request_variable(&mut self, hash: VariableHash) -> bool {
        self.request_variables(&[hash])
    }

    /// Request a batch of variables, in order
    ///
    /// Batches larger than one write (or than the bridge's batch limit) are
    /// split into consecutive frames. Returns `false` without sending when
    /// `hashes` is empty or the session is not ready.
    pub fn request_variables(&mut self, hashes: &[VariableHash]) -> bool {
        if hashes.is_empty() || !self.can_send(Channel::VariableRequest) {
            return false;
        }

        let per_frame = (self.max_write_len / VAR_REQUEST_ENTRY_LEN)
            .min(self.limits.max_batch_vars)
            .max(1);
        for chunk in hashes.chunks(per_frame) {
            let payload = encoder::encode_variable_request_batch(chunk);
            self.enqueue(OutboundFrame::new(Channel::VariableRequest, payload));
        }
        true
    }

    /// Relay a location fix, sending only what changed
    ///
    /// Packed time and quality words go out as individual frames; changed
    /// float readings are collected into one batch. Returns `true` when at
    /// least one frame was queued.
    pub fn send_gps_fix(&mut self, fix: &GpsFix) -> bool {
        if !self.can_send(Channel::GpsData) {
            return false;
        }

        let mut sent = false;

        for (channel, packed) in [
            (GpsChannel::HmsdPacked, fix.hmsd_packed()),
            (GpsChannel::MyqsatPacked, fix.myqsat_packed()),
        ] {
            if self.filter.accept(channel, packed as f64) {
                let payload = encoder::encode_gps_packed(channel.hash(), packed);
                self.enqueue(OutboundFrame::new(Channel::GpsData, payload));
                sent = true;
            }
        }

        let changed: Vec<GpsEntry> = fix
            .scalar_readings()
            .into_iter()
            .filter(|&(channel, value)| self.filter.accept(channel, value))
            .map(|(channel, value)| GpsEntry::new(channel.hash(), value as f32))
            .collect();

        if !changed.is_empty() {
            self.enqueue_gps_entries(&changed);
            sent = true;
        }

        sent
    }

    /// Write arbitrary `(hash, value)` entries on the GPS channel
    ///
    /// The bridge forwards each entry to the ECU as a variable set, so this
    /// doubles as a generic variable write. Bypasses the change filter.
    pub fn send_gps_entries(&mut self, entries: &[GpsEntry]) -> bool {
        if entries.is_empty() || !self.can_send(Channel::GpsData) {
            return false;
        }
        self.enqueue_gps_entries(entries);
        true
    }

    fn enqueue_gps_entries(&mut self, entries: &[GpsEntry]) {
        let per_frame = (self.max_write_len / VAR_RECORD_LEN).max(1);
        for chunk in entries.chunks(per_frame) {
            let payload = encoder::encode_gps_entry_batch(chunk);
            self.enqueue(OutboundFrame::new(Channel::GpsData, payload));
        }
    }

    fn can_send(&self, channel: Channel) -> bool {
        if !self.state.is_ready() {
            debug!("Rejecting {} send while {}", channel, self.state);
            return false;
        }
        if !self.resolved.contains(&channel) {
            debug!("Rejecting {} send, characteristic not resolved", channel);
            return false;
        }
        true
    }

    fn enqueue(&mut self, frame: OutboundFrame) {
        let channel = frame.channel();
        let queue = match channel {
            Channel::Button => &mut self.button_queue,
            Channel::VariableRequest => &mut self.request_queue,
            Channel::GpsData => &mut self.gps_queue,
            Channel::VariableData => {
                warn!("Refusing to write on notify-only channel");
                return;
            }
        };
        let dropped = queue.enqueue(frame, &mut self.transport);
        self.report_dropped(channel, dropped);
    }

    fn report_dropped(&mut self, channel: Channel, dropped: usize) {
        if dropped > 0 {
            self.log_line(&format!("Write failed on {}, dropped {} frame(s)", channel, dropped));
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("Connection state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn log_line(&mut self, line: &str) {
        self.listener.on_log_line(line);
    }
}
