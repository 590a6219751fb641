// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retry, drain and recovery integration tests against the mock transport.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether::{
    DrainError, Endpoint, EndpointConfig, MockTransport, Spawner, Task, TokioSpawner, Transport,
};
use tokio_util::sync::CancellationToken;

fn config(pattern: &str) -> tether::EndpointConfigBuilder {
    EndpointConfig::builder()
        .pattern(pattern)
        .address("mock://resilience")
        .buffer_size(16)
        .reconnect_interval(Duration::from_millis(20))
}

fn build(transport: &MockTransport, config: EndpointConfig) -> Endpoint {
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    Endpoint::new(config, transport).expect("valid endpoint")
}

async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Records spawned task names and spawn times, then runs them on tokio.
#[derive(Default)]
struct RecordingSpawner {
    spawns: Mutex<Vec<(&'static str, Instant)>>,
}

impl RecordingSpawner {
    fn names(&self) -> Vec<&'static str> {
        self.spawns.lock().iter().map(|(name, _)| *name).collect()
    }

    fn gaps(&self) -> Vec<Duration> {
        let spawns = self.spawns.lock();
        spawns.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, name: &'static str, task: Task) {
        self.spawns.lock().push((name, Instant::now()));
        TokioSpawner.spawn(name, task);
    }
}

#[tokio::test]
async fn test_retry_exhaustion_drops_after_k_resends() {
    let transport = MockTransport::new();
    transport.fail_sends(true);
    let ep = build(
        &transport,
        config("push")
            .retry_attempts(3)
            .retry_interval(Duration::from_millis(10))
            .build(),
    );
    ep.start_publisher().unwrap();

    ep.send(b"never".to_vec()).await.unwrap();
    eventually("drop", || ep.stats().dropped == 1).await;

    assert_eq!(transport.send_attempts(), 4);
    assert_eq!(ep.stats().sent, 0);
    assert_eq!(ep.retry_len(), 0);
    assert!(ep.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_shutdown_flushes_pending_retries() {
    let transport = MockTransport::new();
    transport.fail_sends(true);
    let ep = build(
        &transport,
        config("push")
            .retry_interval(Duration::from_secs(5))
            .exit_wait_timeout(Duration::from_secs(2))
            .build(),
    );
    ep.start_publisher().unwrap();

    for i in 0..4u8 {
        ep.send(vec![i]).await.unwrap();
    }
    eventually("first failure", || transport.send_attempts() >= 1).await;
    transport.fail_sends(false);

    let start = Instant::now();
    assert!(ep.shutdown().await.is_ok());
    assert!(start.elapsed() < Duration::from_secs(2));

    let mut sent = transport.sent_frames();
    sent.sort();
    assert_eq!(sent, vec![vec![0], vec![1], vec![2], vec![3]]);
    assert_eq!(ep.stats().sent, 4);
    assert!(ep.is_buffer_empty());
}

#[tokio::test]
async fn test_shutdown_on_broken_transport_reports_leftovers() {
    let transport = MockTransport::new();
    transport.fail_sends(true);
    let exit_wait = Duration::from_millis(200);
    let retry_interval = Duration::from_millis(50);
    let ep = build(
        &transport,
        config("push")
            .retry_interval(retry_interval)
            .exit_wait_timeout(exit_wait)
            .build(),
    );
    ep.start_publisher().unwrap();

    for i in 0..5u8 {
        ep.send(vec![i]).await.unwrap();
    }

    let start = Instant::now();
    let err = ep.shutdown().await.unwrap_err();
    let elapsed = start.elapsed();

    let DrainError::Timeout(leftovers) = err;
    assert!(leftovers.total() > 0);
    assert_eq!(leftovers.total() as u64 + ep.stats().dropped, 5);
    assert!(elapsed >= exit_wait);
    assert!(elapsed < exit_wait + retry_interval + Duration::from_millis(300));
    assert!(ep.is_closed());
    assert_eq!(transport.destroy_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_release_destroys_once() {
    let transport = MockTransport::new();
    let ep = build(&transport, config("push").build());
    ep.start_publisher().unwrap();
    eventually("attach", || transport.attach_count() == 1).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let ep = ep.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                ep.release().await
            } else {
                ep.shutdown().await
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(transport.destroy_count(), 1);
    assert!(ep.is_closed());
}

#[tokio::test]
async fn test_faulted_loop_is_relaunched() {
    let transport = MockTransport::new();
    transport.fail_next_attaches(2);
    let spawner = Arc::new(RecordingSpawner::default());
    let transport_dyn: Arc<dyn Transport> = Arc::new(transport.clone());
    let ep = Endpoint::builder(transport_dyn)
        .config(config("push").build())
        .spawner(spawner.clone())
        .build()
        .unwrap();

    ep.start_publisher().unwrap();
    eventually("third attach", || transport.attach_count() == 3).await;
    eventually("restarts", || ep.stats().restarts == 2).await;

    ep.send(b"after recovery".to_vec()).await.unwrap();
    eventually("delivery", || ep.stats().sent == 1).await;

    assert_eq!(spawner.names(), vec!["publisher"; 3]);
    let reconnect = ep.config().reconnect_interval();
    for gap in spawner.gaps() {
        assert!(gap >= reconnect, "relaunched after {gap:?}, before {reconnect:?}");
    }
    assert!(ep.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_parent_cancel_during_backoff_releases() {
    let transport = MockTransport::new();
    transport.fail_next_attaches(1);
    let parent = CancellationToken::new();
    let transport_dyn: Arc<dyn Transport> = Arc::new(transport.clone());
    let ep = Endpoint::builder(transport_dyn)
        .config(
            config("push")
                .reconnect_interval(Duration::from_millis(300))
                .exit_wait_timeout(Duration::from_millis(200))
                .build(),
        )
        .cancel_token(parent.clone())
        .build()
        .unwrap();

    ep.start_publisher().unwrap();
    eventually("failed attach", || transport.attach_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    parent.cancel();

    eventually("closed", || ep.is_closed()).await;
    assert!(!ep.is_auto_restart());
    assert_eq!(transport.attach_count(), 1);
    assert_eq!(ep.stats().restarts, 0);

    let next = tokio::time::timeout(Duration::from_secs(1), ep.recv_outbound()).await;
    assert_eq!(next.unwrap(), None);
}

#[tokio::test]
async fn test_no_relaunch_when_restart_disabled() {
    let transport = MockTransport::new();
    transport.fail_next_attaches(1);
    let ep = build(&transport, config("push").disable_restart(true).build());

    ep.start_publisher().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(transport.attach_count(), 1);
    assert_eq!(ep.stats().restarts, 0);
    assert!(!ep.is_auto_restart());
}

#[tokio::test]
async fn test_stop_auto_restart_prevents_relaunch() {
    let transport = MockTransport::new();
    transport.fail_next_attaches(usize::MAX);
    let ep = build(
        &transport,
        config("push")
            .reconnect_interval(Duration::from_millis(50))
            .build(),
    );

    ep.start_publisher().unwrap();
    eventually("first attach", || transport.attach_count() >= 1).await;
    ep.stop_auto_restart();
    let attempts = transport.attach_count();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(transport.attach_count() <= attempts + 1);
    assert!(!ep.is_auto_restart());
}
