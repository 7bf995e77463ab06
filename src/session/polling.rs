//! # Polling Loop
//!
//! Periodically requests the displayed gauge variables while the session
//! is ready.
//!
//! Ticks are spaced `interval` apart measured from the start of one tick
//! to the start of the next. The gauge set is read fresh on every tick, and
//! `stop()` interrupts the sleep immediately.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::driver::SessionHandle;
use crate::protocol::VariableHash;

/// Cancellable periodic variable request task
#[derive(Debug, Default)]
pub struct PollingLoop {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl PollingLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling, replacing any loop already running
    ///
    /// # Arguments
    ///
    /// * `interval` - Time between the starts of consecutive ticks
    /// * `session` - Session the requests are sent to
    /// * `hashes` - Called every tick for the variables to request
    pub fn start<F>(&mut self, interval: Duration, session: SessionHandle, hashes: F)
    where
        F: Fn() -> Vec<VariableHash> + Send + 'static,
    {
        self.stop();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::run(interval, session, hashes, cancel.clone()));

        info!("Polling started every {:?}", interval);
        self.cancel = Some(cancel);
        self.task = Some(task);
    }

    /// Cancel the running loop, if any
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            info!("Polling stopped");
        }
        self.task = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn run<F>(interval: Duration, session: SessionHandle, hashes: F, cancel: CancellationToken)
    where
        F: Fn() -> Vec<VariableHash> + Send + 'static,
    {
        let mut ticks = 0u64;

        loop {
            let tick_start = Instant::now();

            let batch = hashes();
            if !batch.is_empty() && session.is_ready() {
                trace!("Poll tick {}: {} variables", ticks, batch.len());
                if session.request_variables(batch).is_err() {
                    debug!("Session closed, polling ends");
                    break;
                }
            }
            ticks += 1;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep_until(tick_start + interval) => {}
            }
        }

        debug!("Polling loop exited after {} ticks", ticks);
    }
}

impl Drop for PollingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared, replaceable list of displayed gauge variables
#[derive(Debug, Clone, Default)]
pub struct GaugeSet(Arc<RwLock<Vec<VariableHash>>>);

impl GaugeSet {
    pub fn new(hashes: Vec<VariableHash>) -> Self {
        Self(Arc::new(RwLock::new(hashes)))
    }

    /// Swap in a new gauge selection; the next poll tick picks it up
    pub fn replace(&self, hashes: Vec<VariableHash>) {
        match self.0.write() {
            Ok(mut guard) => *guard = hashes,
            Err(poisoned) => *poisoned.into_inner() = hashes,
        }
    }

    /// Current selection
    pub fn snapshot(&self) -> Vec<VariableHash> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::decode_variable_request_batch;
    use crate::protocol::Channel;
    use crate::session::{SessionDriver, TelemetrySession};
    use crate::transport::mocks::RecordingTransport;
    use crate::transport::TransportEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct Harness {
        driver: SessionDriver<RecordingTransport, mpsc::UnboundedSender<crate::session::SessionUpdate>>,
        transport: RecordingTransport,
        _updates: mpsc::UnboundedReceiver<crate::session::SessionUpdate>,
    }

    async fn ready_harness() -> Harness {
        let transport = RecordingTransport::new();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let driver = SessionDriver::spawn(TelemetrySession::new(transport.clone(), updates_tx));
        let handle = driver.handle();
        handle.dispatch(TransportEvent::Connected).unwrap();
        handle
            .dispatch(TransportEvent::ServicesResolved(Channel::ALL.to_vec()))
            .unwrap();
        handle.subscribe_state().wait_for(|s| s.is_ready()).await.unwrap();
        Harness {
            driver,
            transport,
            _updates: updates_rx,
        }
    }

    /// Acknowledge every request written so far, so the next one goes out
    fn acknowledge(harness: &Harness) {
        let handle = harness.driver.handle();
        handle.dispatch(TransportEvent::WriteComplete(Channel::VariableRequest)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_spaced_by_interval() {
        let harness = ready_harness().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut polling = PollingLoop::new();
        polling.start(Duration::from_millis(100), harness.driver.handle(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1, 2]
        });

        // First tick runs immediately
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        polling.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_read_every_tick() {
        let harness = ready_harness().await;
        let gauges = GaugeSet::new(vec![10]);
        let source = gauges.clone();

        let mut polling = PollingLoop::new();
        polling.start(Duration::from_millis(100), harness.driver.handle(), move || source.snapshot());

        tokio::task::yield_now().await;
        gauges.replace(vec![20, 30]);
        acknowledge(&harness);
        time::sleep(Duration::from_millis(150)).await;
        polling.stop();

        let frames = harness.transport.written_on(Channel::VariableRequest);
        let batches: Vec<Vec<VariableHash>> = frames
            .iter()
            .map(|f| decode_variable_request_batch(f.payload()))
            .collect();
        assert_eq!(batches, vec![vec![10], vec![20, 30]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let harness = ready_harness().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut polling = PollingLoop::new();
        polling.start(Duration::from_secs(1), harness.driver.handle(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        });
        tokio::task::yield_now().await;
        assert!(polling.is_running());

        polling.stop();
        assert!(!polling.is_running());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_loop() {
        let harness = ready_harness().await;
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut polling = PollingLoop::new();
        let counter = first.clone();
        polling.start(Duration::from_millis(100), harness.driver.handle(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        });
        tokio::task::yield_now().await;

        let counter = second.clone();
        polling.start(Duration::from_millis(100), harness.driver.handle(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        });

        time::sleep(Duration::from_millis(250)).await;
        polling.stop();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_is_noop_when_not_ready() {
        let harness = ready_harness().await;
        let handle = harness.driver.handle();
        handle.dispatch(TransportEvent::Disconnected).unwrap();
        handle
            .subscribe_state()
            .wait_for(|s| !s.is_ready())
            .await
            .unwrap();

        let mut polling = PollingLoop::new();
        polling.start(Duration::from_millis(100), handle, || vec![1]);
        time::sleep(Duration::from_millis(500)).await;

        assert!(polling.is_running());
        assert!(harness.transport.written().is_empty());
    }

    #[test]
    fn test_gauge_set_replace() {
        let gauges = GaugeSet::new(vec![1, 2, 3]);
        let view = gauges.clone();
        gauges.replace(vec![4]);
        assert_eq!(view.snapshot(), vec![4]);
    }
}
