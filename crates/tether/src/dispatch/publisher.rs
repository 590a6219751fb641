// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PUB/PUSH loop: inbound queue to transport, with retry.

use super::finish;
use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::retry::{self, Backoff};

pub(crate) async fn run(endpoint: &Endpoint) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let cancel = inner.cancel.clone();
    let socket = inner.attach()?;

    // inbound before retry, everywhere
    let mut inbound = tokio::select! {
        guard = inner.inbound.lock() => guard,
        _ = cancel.cancelled() => return finish(endpoint).await,
    };
    let mut retry = tokio::select! {
        guard = inner.retry.lock() => guard,
        _ = cancel.cancelled() => {
            drop(inbound);
            return finish(endpoint).await;
        }
    };

    tracing::info!(endpoint = %inner.id, pattern = %inner.pattern, "publisher running");
    let backoff = Backoff::UntilCancelled(cancel.clone());

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(frame) = inbound.recv() => retry::send_or_retry(inner, &socket, frame)?,
            Some(msg) = retry.recv() => retry::service_retry(inner, &socket, msg, &backoff).await?,
            else => break,
        }
    }

    drop(retry);
    drop(inbound);
    finish(endpoint).await
}

#[cfg(test)]
mod tests {
    use crate::config::EndpointConfig;
    use crate::endpoint::Endpoint;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;
    use std::time::Duration;

    fn push(transport: &MockTransport, retry_attempts: u8) -> Endpoint {
        let config = EndpointConfig::builder()
            .pattern("push")
            .address("mock://publisher")
            .buffer_size(32)
            .retry_attempts(retry_attempts)
            .retry_interval(Duration::from_millis(10))
            .exit_wait_timeout(Duration::from_millis(200))
            .build();
        Endpoint::new(config, Arc::new(transport.clone())).unwrap()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_sends_in_order() {
        let transport = MockTransport::new();
        let ep = push(&transport, 3);
        ep.start_publisher().unwrap();

        for i in 0..20u8 {
            ep.send(vec![i]).await.unwrap();
        }
        wait_for(|| transport.sent_frames().len() == 20).await;

        let frames = transport.sent_frames();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame, &vec![i as u8]);
        }
        assert_eq!(ep.stats().sent, 20);
        assert!(ep.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_retry_drops() {
        let transport = MockTransport::new();
        transport.fail_sends(true);
        let ep = push(&transport, 2);
        ep.start_publisher().unwrap();

        ep.send(b"doomed".to_vec()).await.unwrap();
        wait_for(|| ep.stats().dropped == 1).await;

        // initial send plus two resends
        assert_eq!(transport.send_attempts(), 3);
        assert_eq!(ep.retry_len(), 0);
        assert_eq!(ep.stats().sent, 0);
        assert!(ep.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_retry_recovers_when_transport_heals() {
        let transport = MockTransport::new();
        transport.fail_sends(true);
        let ep = push(&transport, 50);
        ep.start_publisher().unwrap();

        ep.send(b"late".to_vec()).await.unwrap();
        wait_for(|| transport.send_attempts() >= 2).await;
        transport.fail_sends(false);

        wait_for(|| ep.stats().sent == 1).await;
        assert_eq!(transport.sent_frames(), vec![b"late".to_vec()]);
        assert_eq!(ep.stats().dropped, 0);
        assert!(ep.shutdown().await.is_ok());
    }
}
