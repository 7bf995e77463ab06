//! # DashLink
//!
//! Dashboard-side BLE telemetry link to an ESP32 CAN bridge.
//!
//! Connects to the bridge (or an in-process bench emulation of it), polls the
//! configured gauge variables, relays location fixes and records received
//! telemetry to JSONL files.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dashlink::config::{Config, LoggingConfig, TransportKind};
use dashlink::protocol::OutboundFrame;
use dashlink::session::{GaugeSet, PollingLoop, SessionDriver, SessionHandle, SessionUpdate};
use dashlink::session::TelemetrySession;
use dashlink::telemetry::TelemetryLogger;
use dashlink::transport::bench::{simulated_fix, BenchBridge};
use dashlink::transport::ChannelTransport;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// How often the bench run feeds a simulated location fix
const GPS_INTERVAL: Duration = Duration::from_secs(1);

/// Number of received samples between status log messages
const LOG_INTERVAL_SAMPLES: u64 = 1000;

/// Main entry point for DashLink
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging
///    - Spawn the session task and the link task
///
/// 2. **Main Loop**
///    - Start polling when the bridge becomes ready, stop when it drops
///    - Record every received sample
///    - In bench mode, feed a simulated GPS fix once per second
///
/// 3. **Graceful Shutdown** on Ctrl+C or when the link ends
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    let _log_guard = init_logging(&config.logging)?;
    info!("DashLink v{} starting...", env!("CARGO_PKG_VERSION"));

    let (transport, frames) = ChannelTransport::new();
    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    let session = TelemetrySession::with_limits(transport, updates_tx, config.session_limits());
    let driver = SessionDriver::spawn(session);
    let handle = driver.handle();

    let cancel = CancellationToken::new();
    let mut link = spawn_link(&config, frames, handle.clone(), cancel.clone())?;
    let mut link_done = false;

    let mut recorder = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry).context("Failed to open telemetry log")?)
    } else {
        None
    };

    let gauges = GaugeSet::new(config.gauges.hashes.clone());
    let poll_interval = config.polling.interval();
    let mut polling = PollingLoop::new();

    let simulate_gps = config.transport.kind == TransportKind::Bench;
    let started = Instant::now();
    let mut gps_tick = time::interval(GPS_INTERVAL);
    let mut sample_count: u64 = 0;

    info!("Polling {} gauges every {:?}", config.gauges.hashes.len(), poll_interval);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }

            result = &mut link, if !link_done => {
                link_done = true;
                match result {
                    Ok(Ok(())) => info!("Link closed"),
                    Ok(Err(e)) => warn!("Link ended: {}", e),
                    Err(e) => warn!("Link task failed: {}", e),
                }
                break;
            }

            update = updates.recv() => match update {
                Some(SessionUpdate::Sample(sample)) => {
                    sample_count += 1;
                    trace!("Sample {} = {}", sample.hash, sample.value);
                    if let Some(recorder) = recorder.as_mut() {
                        if let Err(e) = recorder.record(&sample) {
                            warn!("Failed to record sample: {}", e);
                        }
                    }
                    if sample_count % LOG_INTERVAL_SAMPLES == 0 {
                        info!("Received {} samples", sample_count);
                    }
                }
                Some(SessionUpdate::Connectivity(true)) => {
                    let source = gauges.clone();
                    polling.start(poll_interval, handle.clone(), move || source.snapshot());
                }
                Some(SessionUpdate::Connectivity(false)) => polling.stop(),
                Some(SessionUpdate::Log(line)) => debug!("Session: {}", line),
                None => break,
            },

            _ = gps_tick.tick(), if simulate_gps => {
                if handle.is_ready() {
                    let fix = simulated_fix(started.elapsed(), Local::now().naive_local());
                    handle.send_gps_fix(fix)?;
                }
            }
        }
    }

    polling.stop();
    cancel.cancel();
    if !link_done {
        if let Ok(Err(e)) = link.await {
            warn!("Link ended: {}", e);
        }
    }

    let session = driver.shutdown().await?;
    if let Some(recorder) = recorder.as_mut() {
        recorder.flush()?;
    }

    info!(
        "Shutdown complete: {} samples received, final state {}",
        sample_count,
        session.state()
    );
    Ok(())
}

/// Load the configuration, falling back to defaults when the default file is absent
fn load_config(path: &str) -> Result<Config> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load configuration from {}", path))
}

/// Install stdout logging plus an optional daily rolling file
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "dashlink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Start the task that carries frames for the configured transport
fn spawn_link(
    config: &Config,
    frames: mpsc::Receiver<OutboundFrame>,
    handle: SessionHandle,
    cancel: CancellationToken,
) -> Result<JoinHandle<dashlink::Result<()>>> {
    match config.transport.kind {
        TransportKind::Bench => {
            info!("Using bench bridge emulation");
            let bridge = BenchBridge::new(frames, handle, config.ble.requested_mtu);
            Ok(tokio::spawn(bridge.run(cancel)))
        }
        #[cfg(feature = "ble")]
        TransportKind::Ble => {
            let link = dashlink::transport::ble::BleLink::new(config.ble.clone(), frames, handle);
            Ok(tokio::spawn(link.run(cancel)))
        }
        #[cfg(not(feature = "ble"))]
        TransportKind::Ble => {
            anyhow::bail!("transport kind \"ble\" requires building with --features ble")
        }
    }
}
