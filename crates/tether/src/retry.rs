// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded resend of failed sends.
//!
//! A frame whose first send fails becomes a [`RetryMessage`] with zero
//! attempts. Each failed resend bumps the attempt count; once it reaches the
//! maximum the message is dropped and counted. Between resends the owning
//! loop waits the retry interval, which ends early on cancellation (normal
//! running) or at the release deadline (drain).

use crate::endpoint::{Inner, SocketHandle};
use crate::error::Fault;
use crate::transport::TransportError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Attempts used when a message is built with a zero maximum.
pub const DEFAULT_RETRY_ATTEMPTS: u8 = 5;

/// A payload awaiting resend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryMessage {
    payload: Vec<u8>,
    attempts: u8,
    max_attempts: u8,
}

impl RetryMessage {
    pub fn new(payload: Vec<u8>, max_attempts: u8) -> Self {
        let max_attempts = if max_attempts == 0 {
            DEFAULT_RETRY_ATTEMPTS
        } else {
            max_attempts
        };
        Self {
            payload,
            attempts: 0,
            max_attempts,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Failed resends so far.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// True while another resend is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Count a failed resend. Returns whether another one is allowed.
    pub fn record_failure(&mut self) -> bool {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
        }
        self.can_retry()
    }
}

/// How long a retry backoff may last.
pub(crate) enum Backoff {
    /// Full interval, cut short by cancellation.
    UntilCancelled(CancellationToken),
    /// Full interval, cut short by the release deadline.
    UntilDeadline(Instant),
}

impl Backoff {
    /// Returns `false` when the wait was cut short.
    async fn wait(&self, interval: Duration) -> bool {
        match self {
            Self::UntilCancelled(token) => tokio::select! {
                _ = tokio::time::sleep(interval) => true,
                _ = token.cancelled() => false,
            },
            Self::UntilDeadline(deadline) => tokio::select! {
                _ = tokio::time::sleep(interval) => true,
                _ = tokio::time::sleep_until(*deadline) => false,
            },
        }
    }
}

/// Send a fresh frame; on failure hand it to the retry queue.
pub(crate) fn send_or_retry(
    inner: &Inner,
    socket: &SocketHandle,
    frame: Vec<u8>,
) -> Result<(), Fault> {
    match socket.send(&frame) {
        Ok(()) => {
            inner.stats.record_sent();
            Ok(())
        }
        Err(TransportError::Destroyed) => {
            requeue(inner, RetryMessage::new(frame, inner.config.retry_attempts));
            Err(Fault::Destroyed)
        }
        Err(e) => {
            tracing::debug!(endpoint = %inner.id, error = %e, "send failed, queued for retry");
            requeue(inner, RetryMessage::new(frame, inner.config.retry_attempts));
            Ok(())
        }
    }
}

/// Resend one retry message.
pub(crate) async fn service_retry(
    inner: &Inner,
    socket: &SocketHandle,
    mut msg: RetryMessage,
    backoff: &Backoff,
) -> Result<(), Fault> {
    match socket.send(msg.payload()) {
        Ok(()) => {
            inner.stats.record_sent();
            tracing::trace!(endpoint = %inner.id, attempts = msg.attempts(), "retry delivered");
            Ok(())
        }
        Err(TransportError::Destroyed) => {
            requeue(inner, msg);
            Err(Fault::Destroyed)
        }
        Err(e) => {
            if !msg.record_failure() {
                inner.stats.record_dropped();
                tracing::warn!(
                    endpoint = %inner.id,
                    attempts = msg.attempts(),
                    error = %e,
                    "retry attempts exhausted, message dropped"
                );
                return Ok(());
            }
            if !backoff.wait(inner.config.retry_interval()).await {
                tracing::debug!(endpoint = %inner.id, "retry backoff interrupted");
            }
            requeue(inner, msg);
            Ok(())
        }
    }
}

/// Put a message back without blocking; a full queue drops it.
fn requeue(inner: &Inner, msg: RetryMessage) {
    if inner.retry.try_push(msg).is_err() {
        inner.stats.record_dropped();
        tracing::warn!(endpoint = %inner.id, "retry queue full, message dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_uses_default() {
        let msg = RetryMessage::new(b"x".to_vec(), 0);
        assert_eq!(msg.max_attempts(), DEFAULT_RETRY_ATTEMPTS);
        assert_eq!(msg.attempts(), 0);
        assert!(msg.can_retry());
    }

    #[test]
    fn test_attempts_never_exceed_max() {
        let mut msg = RetryMessage::new(b"x".to_vec(), 2);
        assert!(msg.record_failure());
        assert!(!msg.record_failure());
        assert!(!msg.record_failure());
        assert_eq!(msg.attempts(), 2);
        assert_eq!(msg.into_payload(), b"x".to_vec());
    }

    #[tokio::test]
    async fn test_backoff_cut_short() {
        let token = CancellationToken::new();
        token.cancel();
        let backoff = Backoff::UntilCancelled(token);
        assert!(!backoff.wait(Duration::from_secs(10)).await);

        let backoff = Backoff::UntilDeadline(Instant::now() + Duration::from_millis(5));
        assert!(!backoff.wait(Duration::from_secs(10)).await);

        let backoff = Backoff::UntilDeadline(Instant::now() + Duration::from_secs(10));
        assert!(backoff.wait(Duration::from_millis(1)).await);
    }
}
