// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatch loops, one per pattern family.
//!
//! Every loop attaches first, runs until the endpoint's token is cancelled
//! and then runs release itself. Transport failures that make the socket
//! unusable end the loop with a [`Fault`](crate::Fault) for the supervisor.

pub(crate) mod consumer;
pub(crate) mod publisher;
pub(crate) mod request;

use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::transport::{Socket, TransportError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A blocking receive still running on a worker thread.
pub(crate) type PendingRecv = JoinHandle<Result<Vec<u8>, TransportError>>;

/// Outcome of [`recv_blocking`].
pub(crate) enum Recv {
    Done(Result<Vec<u8>, TransportError>),
    /// The token fired first. The receive keeps running until the socket is
    /// destroyed and may still yield a frame.
    Cancelled(PendingRecv),
}

fn spawn_recv(socket: Arc<dyn Socket>) -> PendingRecv {
    tokio::task::spawn_blocking(move || socket.recv_frame())
}

/// Blocking receive on a worker thread, interrupted by cancellation.
pub(crate) async fn recv_blocking(
    socket: Arc<dyn Socket>,
    cancel: &CancellationToken,
) -> Result<Recv, Fault> {
    let mut receive = spawn_recv(socket);
    tokio::select! {
        biased;
        joined = &mut receive => joined
            .map(Recv::Done)
            .map_err(|e| Fault::Aborted(e.to_string())),
        _ = cancel.cancelled() => Ok(Recv::Cancelled(receive)),
    }
}

/// Finish a loop after cancellation.
pub(crate) async fn finish(endpoint: &Endpoint) -> Result<(), Fault> {
    let outcome = endpoint.release().await;
    log_release(endpoint, outcome);
    Ok(())
}

/// Finish a receiving loop whose last receive was cut short.
///
/// Release runs alongside the pending receive. A frame arriving before the
/// socket is destroyed goes to outbound while release still allows it, and
/// with `keep_receiving` the loop goes on receiving until then. A frame that
/// cannot be handed over is counted as dropped.
pub(crate) async fn finish_receiving(
    endpoint: &Endpoint,
    socket: Arc<dyn Socket>,
    pending: PendingRecv,
    keep_receiving: bool,
) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let release = endpoint.release();
    tokio::pin!(release);
    let mut pending = Some(pending);

    let outcome = loop {
        let Some(receive) = pending.as_mut() else {
            break (&mut release).await;
        };
        tokio::select! {
            outcome = &mut release => break outcome,
            joined = receive => {
                pending = None;
                match joined {
                    Ok(Ok(frame)) => {
                        tokio::select! {
                            biased;
                            pushed = inner.outbound.push(frame) => match pushed {
                                Ok(()) => inner.stats.record_received(),
                                Err(_) => inner.stats.record_dropped(),
                            },
                            outcome = &mut release => {
                                inner.stats.record_dropped();
                                break outcome;
                            }
                        }
                    }
                    Ok(Err(TransportError::Destroyed)) | Err(_) => continue,
                    Ok(Err(e)) => {
                        tracing::trace!(endpoint = %inner.id, error = %e, "receive during release");
                    }
                }
                if keep_receiving {
                    pending = Some(spawn_recv(Arc::clone(&socket)));
                }
            }
        }
    };

    // The socket is gone now, so the receive returns promptly.
    if let Some(receive) = pending {
        if let Ok(Ok(_)) = receive.await {
            inner.stats.record_dropped();
            tracing::warn!(endpoint = %inner.id, "frame received after release, dropped");
        }
    }

    log_release(endpoint, outcome);
    Ok(())
}

fn log_release(endpoint: &Endpoint, outcome: Result<(), crate::error::DrainError>) {
    if let Err(e) = outcome {
        tracing::debug!(endpoint = %endpoint.id(), error = %e, "release reported leftovers");
    }
}
