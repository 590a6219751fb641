// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! REQ and REP loops.
//!
//! Both alternate strictly: one request, one reply. Requests are never
//! retried. A requester that gets no usable reply hands an empty frame to the
//! application so every request is answered exactly once.

use super::{finish, finish_receiving, recv_blocking, Recv};
use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::transport::TransportError;

pub(crate) async fn run_requester(endpoint: &Endpoint) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let cancel = inner.cancel.clone();
    let socket = inner.attach()?;

    let mut inbound = tokio::select! {
        guard = inner.inbound.lock() => guard,
        _ = cancel.cancelled() => return finish(endpoint).await,
    };

    tracing::info!(endpoint = %inner.id, "requester running");

    loop {
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = inbound.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let reply = match socket.send(&request) {
            Ok(()) => {
                inner.stats.record_sent();
                let received = match recv_blocking(socket.socket(), &cancel).await? {
                    Recv::Done(received) => received,
                    Recv::Cancelled(pending) => {
                        drop(inbound);
                        return finish_receiving(endpoint, socket.socket(), pending, false).await;
                    }
                };
                match received {
                    Ok(reply) => {
                        inner.stats.record_received();
                        reply
                    }
                    Err(TransportError::Destroyed) => return Err(Fault::Destroyed),
                    Err(e) => {
                        tracing::warn!(endpoint = %inner.id, error = %e, "no reply");
                        Vec::new()
                    }
                }
            }
            Err(e @ TransportError::State(_)) => return Err(Fault::Protocol(e)),
            Err(TransportError::Destroyed) => return Err(Fault::Destroyed),
            Err(e) => {
                inner.stats.record_dropped();
                tracing::warn!(endpoint = %inner.id, error = %e, "request not sent");
                Vec::new()
            }
        };

        tokio::select! {
            pushed = inner.outbound.push(reply) => {
                if pushed.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    drop(inbound);
    finish(endpoint).await
}

pub(crate) async fn run_responser(endpoint: &Endpoint) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let cancel = inner.cancel.clone();
    let socket = inner.attach()?;

    let mut inbound = tokio::select! {
        guard = inner.inbound.lock() => guard,
        _ = cancel.cancelled() => return finish(endpoint).await,
    };

    tracing::info!(endpoint = %inner.id, "responser running");

    loop {
        let received = match recv_blocking(socket.socket(), &cancel).await? {
            Recv::Done(received) => received,
            Recv::Cancelled(pending) => {
                drop(inbound);
                return finish_receiving(endpoint, socket.socket(), pending, false).await;
            }
        };
        let request = match received {
            Ok(request) => request,
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Destroyed) => return Err(Fault::Destroyed),
            Err(e @ TransportError::State(_)) => return Err(Fault::Protocol(e)),
            Err(e) => {
                tracing::warn!(endpoint = %inner.id, error = %e, "receive failed");
                continue;
            }
        };
        inner.stats.record_received();

        tokio::select! {
            pushed = inner.outbound.push(request) => {
                if pushed.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            reply = inbound.recv() => match reply {
                Some(reply) => reply,
                None => break,
            },
        };

        match socket.send(&reply) {
            Ok(()) => inner.stats.record_sent(),
            Err(e @ TransportError::State(_)) => return Err(Fault::Protocol(e)),
            Err(TransportError::Destroyed) => return Err(Fault::Destroyed),
            Err(e) => {
                inner.stats.record_dropped();
                tracing::warn!(endpoint = %inner.id, error = %e, "reply not sent");
            }
        }
    }

    drop(inbound);
    finish(endpoint).await
}
