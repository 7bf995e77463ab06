//! # BLE Link
//!
//! Central-role binding to the real bridge over `btleplug`.
//!
//! The link scans for a peripheral advertising the bridge service, connects,
//! resolves the four characteristics and then shuttles frames out and
//! notifications in until the device drops or the link is cancelled. Every
//! step is reported to the session as a [`TransportEvent`].
//!
//! `btleplug` does not expose the negotiated ATT MTU. Frames stay sized for
//! the default MTU unless `assume_mtu` is configured, in which case
//! `requested_mtu` is reported once the link is up.

use std::collections::HashMap;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _};
use btleplug::api::{ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::TransportEvent;
use crate::config::BleConfig;
use crate::error::{DashLinkError, Result};
use crate::protocol::constants::SERVICE_UUID;
use crate::protocol::{Channel, OutboundFrame};
use crate::session::SessionHandle;

/// How often the peripheral list is re-read while scanning
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(300);

fn ble_error(context: &str, e: btleplug::Error) -> DashLinkError {
    DashLinkError::Transport(format!("{}: {}", context, e))
}

/// Radio link to one bridge
pub struct BleLink {
    config: BleConfig,
    frames: mpsc::Receiver<OutboundFrame>,
    session: SessionHandle,
}

impl BleLink {
    pub fn new(config: BleConfig, frames: mpsc::Receiver<OutboundFrame>, session: SessionHandle) -> Self {
        Self {
            config,
            frames,
            session,
        }
    }

    /// Connect and serve the link until it drops or `cancel` fires
    ///
    /// `Disconnected` is always reported on the way out.
    ///
    /// # Errors
    ///
    /// Returns a transport error when no adapter is present, the bridge is
    /// not found within the scan timeout, or connecting fails.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        self.session.dispatch(TransportEvent::Connecting)?;
        let result = self.connect_and_serve(&cancel).await;
        let _ = self.session.dispatch(TransportEvent::Disconnected);
        result
    }

    async fn connect_and_serve(&mut self, cancel: &CancellationToken) -> Result<()> {
        let adapter = first_adapter().await?;

        let peripheral = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            found = self.find_bridge(&adapter) => found?,
        };

        peripheral
            .connect()
            .await
            .map_err(|e| ble_error("connect failed", e))?;
        self.session.dispatch(TransportEvent::Connected)?;

        time::sleep(Duration::from_millis(self.config.discovery_delay_ms)).await;
        peripheral
            .discover_services()
            .await
            .map_err(|e| ble_error("service discovery failed", e))?;

        let characteristics: HashMap<Channel, Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == SERVICE_UUID)
            .filter_map(|c| Channel::from_uuid(c.uuid).map(|channel| (channel, c)))
            .collect();

        let mut resolved: Vec<Channel> = characteristics.keys().copied().collect();
        resolved.sort();
        info!("Resolved characteristics: {:?}", resolved);
        self.session.dispatch(TransportEvent::ServicesResolved(resolved))?;

        if let Some(var_data) = characteristics.get(&Channel::VariableData) {
            peripheral
                .subscribe(var_data)
                .await
                .map_err(|e| ble_error("subscribe failed", e))?;
        }
        if let Some(mtu) = reported_mtu(&self.config) {
            self.session.dispatch(TransportEvent::MtuChanged(mtu))?;
        }

        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| ble_error("notification stream unavailable", e))?;
        let mut events = adapter
            .events()
            .await
            .map_err(|e| ble_error("adapter event stream unavailable", e))?;
        let peripheral_id = peripheral.id();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Closing BLE link");
                    if let Err(e) = peripheral.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                    return Ok(());
                }
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                        info!("Bridge disconnected");
                        return Ok(());
                    }
                    Some(_) => {}
                    None => return Ok(()),
                },
                notification = notifications.next() => match notification {
                    Some(notification) => match Channel::from_uuid(notification.uuid) {
                        Some(channel) => {
                            trace!("{} byte notification on {}", notification.value.len(), channel);
                            self.session.dispatch(TransportEvent::Notification(
                                channel,
                                Bytes::from(notification.value),
                            ))?;
                        }
                        None => debug!("Notification from unknown characteristic {}", notification.uuid),
                    },
                    None => return Ok(()),
                },
                frame = self.frames.recv() => match frame {
                    Some(frame) => {
                        let channel = frame.channel();
                        write_frame(&peripheral, &characteristics, frame).await;
                        self.session.dispatch(TransportEvent::WriteComplete(channel))?;
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// Scan until a matching bridge shows up or the scan times out
    async fn find_bridge(&self, adapter: &Adapter) -> Result<Peripheral> {
        info!("Scanning for {:?}", self.config.device_name);
        adapter
            .start_scan(ScanFilter {
                services: vec![SERVICE_UUID],
            })
            .await
            .map_err(|e| ble_error("scan failed", e))?;

        let deadline = Instant::now() + Duration::from_millis(self.config.scan_timeout_ms);
        while Instant::now() < deadline {
            let peripherals = adapter
                .peripherals()
                .await
                .map_err(|e| ble_error("listing peripherals failed", e))?;

            for peripheral in peripherals {
                let name = match peripheral.properties().await {
                    Ok(Some(props)) => props.local_name,
                    Ok(None) => None,
                    Err(e) => {
                        debug!("Skipping peripheral: {}", e);
                        None
                    }
                };

                if let Some(name) = name.filter(|n| name_matches(&self.config, n)) {
                    let _ = adapter.stop_scan().await;
                    info!("Found bridge {:?}", name);
                    return Ok(peripheral);
                }
            }

            time::sleep(SCAN_POLL_INTERVAL).await;
        }

        let _ = adapter.stop_scan().await;
        Err(DashLinkError::Transport(format!(
            "no bridge found within {} ms",
            self.config.scan_timeout_ms
        )))
    }
}

fn name_matches(config: &BleConfig, name: &str) -> bool {
    name == config.device_name
        || (!config.name_filter.is_empty() && name.contains(&config.name_filter))
}

/// MTU to report after connecting, if any
fn reported_mtu(config: &BleConfig) -> Option<u16> {
    config.assume_mtu.then_some(config.requested_mtu)
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|e| ble_error("BLE manager unavailable", e))?;
    manager
        .adapters()
        .await
        .map_err(|e| ble_error("listing adapters failed", e))?
        .into_iter()
        .next()
        .ok_or_else(|| DashLinkError::Transport("no BLE adapter found".to_string()))
}

async fn write_frame(
    peripheral: &Peripheral,
    characteristics: &HashMap<Channel, Characteristic>,
    frame: OutboundFrame,
) {
    let channel = frame.channel();
    let Some(characteristic) = characteristics.get(&channel) else {
        warn!("No characteristic for {}, frame dropped", channel);
        return;
    };

    if let Err(e) = peripheral
        .write(characteristic, frame.payload(), WriteType::WithoutResponse)
        .await
    {
        warn!("Write on {} failed: {}", channel, e);
    }
}
