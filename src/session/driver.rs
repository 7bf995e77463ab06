//! # Session Driver
//!
//! Runs a [`TelemetrySession`] on its own task. Transport callbacks and UI
//! intents arrive as [`SessionCommand`]s over one channel, so the session
//! sees them strictly one at a time.
//!
//! The current [`ConnectionState`] is published on a `watch` channel after
//! every command; [`SessionHandle::is_ready`] reads it without a round trip.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::ConnectionState;
use super::telemetry::{SessionListener, TelemetrySession};
use crate::error::{DashLinkError, Result};
use crate::gps::GpsFix;
use crate::protocol::{GpsEntry, VariableHash};
use crate::transport::{Transport, TransportEvent};

/// Work item for the session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SendButtonMask(u16),
    RequestVariables(Vec<VariableHash>),
    SendGpsFix(GpsFix),
    SendGpsEntries(Vec<GpsEntry>),
    /// Event reported by the transport binding
    Transport(TransportEvent),
}

/// Cloneable handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    /// Queue a command for the session task
    ///
    /// # Errors
    ///
    /// Returns [`DashLinkError::SessionClosed`] once the task has exited.
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| DashLinkError::SessionClosed)
    }

    /// Forward a transport event to the session
    pub fn dispatch(&self, event: TransportEvent) -> Result<()> {
        self.send(SessionCommand::Transport(event))
    }

    pub fn send_button_mask(&self, mask: u16) -> Result<()> {
        self.send(SessionCommand::SendButtonMask(mask))
    }

    pub fn request_variables(&self, hashes: Vec<VariableHash>) -> Result<()> {
        self.send(SessionCommand::RequestVariables(hashes))
    }

    pub fn send_gps_fix(&self, fix: GpsFix) -> Result<()> {
        self.send(SessionCommand::SendGpsFix(fix))
    }

    pub fn send_gps_entries(&self, entries: Vec<GpsEntry>) -> Result<()> {
        self.send(SessionCommand::SendGpsEntries(entries))
    }

    /// Last state published by the session task
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Receiver that wakes on every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

/// Owns the task running a session
pub struct SessionDriver<T: Transport, L: SessionListener> {
    handle: SessionHandle,
    cancel: CancellationToken,
    task: JoinHandle<TelemetrySession<T, L>>,
}

impl<T, L> SessionDriver<T, L>
where
    T: Transport + 'static,
    L: SessionListener + 'static,
{
    /// Move `session` onto a new task and start processing commands
    pub fn spawn(session: TelemetrySession<T, L>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(session.state());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::run(session, commands_rx, state_tx, cancel.clone()));

        Self {
            handle: SessionHandle {
                commands: commands_tx,
                state: state_rx,
            },
            cancel,
            task,
        }
    }

    /// A new handle to the running session
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the task and take the session back
    ///
    /// Commands already queued are processed before the task stops.
    pub async fn shutdown(self) -> Result<TelemetrySession<T, L>> {
        self.cancel.cancel();
        self.task.await.map_err(|e| {
            warn!("Session task failed: {}", e);
            DashLinkError::SessionClosed
        })
    }

    async fn run(
        mut session: TelemetrySession<T, L>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        state_tx: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
    ) -> TelemetrySession<T, L> {
        info!("Session task started");

        loop {
            let command = tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                _ = cancel.cancelled() => {
                    debug!("Session task cancelled");
                    break;
                }
            };

            Self::apply(&mut session, command);

            let current = session.state();
            state_tx.send_if_modified(|published| {
                if *published != current {
                    *published = current;
                    true
                } else {
                    false
                }
            });
        }

        info!("Session task stopped in state {}", session.state());
        session
    }

    fn apply(session: &mut TelemetrySession<T, L>, command: SessionCommand) {
        let accepted = match command {
            SessionCommand::Transport(event) => {
                session.handle_transport_event(event);
                true
            }
            SessionCommand::SendButtonMask(mask) => session.send_button_mask(mask),
            SessionCommand::RequestVariables(hashes) => session.request_variables(&hashes),
            SessionCommand::SendGpsFix(fix) => session.send_gps_fix(&fix),
            SessionCommand::SendGpsEntries(entries) => session.send_gps_entries(&entries),
        };

        if !accepted {
            debug!("Command not sent in state {}", session.state());
        }
    }
}
