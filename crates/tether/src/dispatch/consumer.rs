// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SUB/PULL loop: transport to outbound queue.
//!
//! Receives block on a worker thread. A full outbound queue stalls the pump,
//! which is where backpressure reaches the transport.

use super::{finish, finish_receiving, recv_blocking, Recv};
use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::transport::TransportError;

pub(crate) async fn run(endpoint: &Endpoint) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let cancel = inner.cancel.clone();
    let socket = inner.attach()?;

    tracing::info!(endpoint = %inner.id, pattern = %inner.pattern, "consumer running");

    loop {
        let received = match recv_blocking(socket.socket(), &cancel).await? {
            Recv::Done(received) => received,
            Recv::Cancelled(pending) => {
                return finish_receiving(endpoint, socket.socket(), pending, true).await;
            }
        };

        match received {
            Ok(frame) => {
                tokio::select! {
                    pushed = inner.outbound.push(frame) => {
                        if pushed.is_err() {
                            break;
                        }
                        inner.stats.record_received();
                    }
                    _ = cancel.cancelled() => {
                        inner.stats.record_dropped();
                        break;
                    }
                }
            }
            Err(TransportError::Destroyed) => return Err(Fault::Destroyed),
            Err(TransportError::Timeout) => {
                tracing::trace!(endpoint = %inner.id, "receive timeout");
            }
            Err(e) => {
                tracing::warn!(endpoint = %inner.id, error = %e, "receive failed");
            }
        }
    }

    finish(endpoint).await
}
