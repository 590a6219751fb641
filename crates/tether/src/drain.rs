// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Release: flush what is buffered, then tear the transport down.
//!
//! Release turns auto-restart off, cancels the endpoint's loops and takes over
//! the inbound and retry queues. Until every queue is empty or the exit-wait
//! deadline passes it keeps sending inbound frames and servicing retries on
//! the live socket. Outbound frames are left to the application; release only
//! waits for them to be picked up.
//!
//! Whatever the exit path, the socket is destroyed exactly once and the
//! endpoint ends closed.

use crate::endpoint::Inner;
use crate::error::{BufferInfo, DrainError};
use crate::retry::{self, Backoff};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};

/// How often emptiness is re-checked while nothing is ready.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) async fn release(inner: &Inner) -> Result<(), DrainError> {
    inner.auto_restart.store(false, std::sync::atomic::Ordering::Release);
    inner.cancel.cancel();

    let deadline = Instant::now() + inner.config.exit_wait_timeout();
    let outcome = drain(inner, deadline).await;

    inner.close_socket();
    inner.released.cancel();

    match &outcome {
        Ok(()) => tracing::info!(endpoint = %inner.id, "released"),
        Err(e) => tracing::warn!(endpoint = %inner.id, error = %e, "released with leftovers"),
    }
    outcome
}

async fn drain(inner: &Inner, deadline: Instant) -> Result<(), DrainError> {
    let Ok(mut inbound) = timeout_at(deadline, inner.inbound.lock()).await else {
        return Err(timed_out(inner));
    };
    let Ok(mut retry) = timeout_at(deadline, inner.retry.lock()).await else {
        return Err(timed_out(inner));
    };

    let socket = inner.socket.load_full();
    let backoff = Backoff::UntilDeadline(deadline);

    let outcome = loop {
        if inner.buffer_info().is_empty() {
            break Ok(());
        }

        tracing::debug!(endpoint = %inner.id, buffers = %inner.buffer_info(), "draining");

        tokio::select! {
            biased;
            _ = sleep_until(deadline) => break Err(timed_out(inner)),
            Some(frame) = inbound.recv(), if socket.is_some() => {
                if let Some(socket) = &socket {
                    if retry::send_or_retry(inner, socket, frame).is_err() {
                        break Err(timed_out(inner));
                    }
                }
            }
            Some(msg) = retry.recv(), if socket.is_some() => {
                if let Some(socket) = &socket {
                    if retry::service_retry(inner, socket, msg, &backoff).await.is_err() {
                        break Err(timed_out(inner));
                    }
                }
            }
            _ = sleep(POLL_INTERVAL) => {}
        }
    };

    inbound.close();
    retry.close();
    if let Some(mut outbound) = inner.outbound.try_lock() {
        outbound.close();
    }
    outcome
}

fn timed_out(inner: &Inner) -> DrainError {
    let leftovers: BufferInfo = inner.buffer_info();
    tracing::warn!(endpoint = %inner.id, "exit wait timeout with: {leftovers}");
    DrainError::Timeout(leftovers)
}
