//! Full stack against the bench bridge: driver, polling and notifications

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use dashlink::session::{
    ConnectionState, GaugeSet, PollingLoop, SessionDriver, SessionUpdate, TelemetrySession,
};
use dashlink::transport::bench::BenchBridge;
use dashlink::transport::ChannelTransport;

struct Stack {
    driver: SessionDriver<ChannelTransport, mpsc::UnboundedSender<SessionUpdate>>,
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    cancel: CancellationToken,
    bench: tokio::task::JoinHandle<dashlink::Result<()>>,
}

async fn start_stack(mtu: u16) -> Stack {
    let (transport, frames) = ChannelTransport::new();
    let (updates_tx, updates) = mpsc::unbounded_channel();
    let driver = SessionDriver::spawn(TelemetrySession::new(transport, updates_tx));

    let cancel = CancellationToken::new();
    let bench = tokio::spawn(BenchBridge::new(frames, driver.handle(), mtu).run(cancel.clone()));

    driver
        .handle()
        .subscribe_state()
        .wait_for(|s| s.is_ready())
        .await
        .unwrap();

    Stack {
        driver,
        updates,
        cancel,
        bench,
    }
}

fn drain_samples(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> Vec<i32> {
    let mut hashes = Vec::new();
    while let Ok(update) = updates.try_recv() {
        if let SessionUpdate::Sample(sample) = update {
            hashes.push(sample.hash);
        }
    }
    hashes
}

#[tokio::test(start_paused = true)]
async fn test_polling_delivers_gauge_samples() {
    let mut stack = start_stack(517).await;
    let gauges = GaugeSet::new(vec![11, 22, 33]);
    let source = gauges.clone();

    let mut polling = PollingLoop::new();
    polling.start(Duration::from_millis(100), stack.driver.handle(), move || source.snapshot());

    time::sleep(Duration::from_millis(250)).await;
    polling.stop();
    time::sleep(Duration::from_millis(10)).await;

    let hashes = drain_samples(&mut stack.updates);
    // Ticks at 0, 100 and 200 ms
    assert_eq!(hashes, vec![11, 22, 33, 11, 22, 33, 11, 22, 33]);

    stack.cancel.cancel();
    stack.bench.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_small_mtu_segments_requests_and_responses() {
    let mut stack = start_stack(23).await;
    let hashes: Vec<i32> = (1..=8).collect();

    stack.driver.handle().request_variables(hashes.clone()).unwrap();
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(drain_samples(&mut stack.updates), hashes);

    stack.cancel.cancel();
    stack.bench.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bench_shutdown_disconnects_session() {
    let mut stack = start_stack(517).await;
    let mut state = stack.driver.handle().subscribe_state();

    stack.cancel.cancel();
    stack.bench.await.unwrap().unwrap();

    state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();

    let mut saw_disconnect = false;
    time::sleep(Duration::from_millis(1)).await;
    while let Ok(update) = stack.updates.try_recv() {
        if update == SessionUpdate::Connectivity(false) {
            saw_disconnect = true;
        }
    }
    assert!(saw_disconnect);

    // Requests after the link is gone are silently dropped
    stack.driver.handle().request_variables(vec![1]).unwrap();
    let session = stack.driver.shutdown().await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}
