// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry heartbeat.
//!
//! Every period the registrar samples the endpoint's queue depths, sends a
//! [`StatusMessage`] over its own REQ connection and waits for any reply as an
//! acknowledgement. It runs as a separately supervised task, so a failing
//! registry never disturbs message dispatch.

mod status;

pub use status::{CodecError, StatusMessage};

use crate::dispatch::{recv_blocking, Recv};
use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::pattern::Pattern;
use crate::transport::{Socket, SocketOption, TransportError};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Timeout for registry sends and acknowledgements when none is configured.
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(3);

/// Destroys the registry connection however the task ends.
struct Connection(Arc<dyn Socket>);

impl Drop for Connection {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Address reported to the registry.
pub fn local_host() -> String {
    local_ip_address::local_ip()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

fn non_zero(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        REGISTRY_TIMEOUT
    } else {
        timeout
    }
}

pub(crate) async fn run(endpoint: &Endpoint) -> Result<(), Fault> {
    let inner = &endpoint.inner;
    let Some(address) = inner.config.registry_address.as_deref() else {
        return Ok(());
    };
    let cancel = inner.cancel.clone();

    let connection = Connection(
        inner
            .transport
            .connect(Pattern::Req, address)
            .map_err(Fault::Registrar)?,
    );
    connection
        .0
        .set_option(SocketOption::SendTimeout(non_zero(inner.config.send_timeout())))
        .map_err(Fault::Registrar)?;
    connection
        .0
        .set_option(SocketOption::RecvTimeout(non_zero(inner.config.recv_timeout())))
        .map_err(Fault::Registrar)?;

    let host = local_host();
    let period = inner.config.register_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(endpoint = %inner.id, registry = %address, ?period, "registrar running");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = StatusMessage::new(
            inner.id.as_str(),
            host.as_str(),
            inner.pattern,
            inner.buffer_info(),
        );
        let frame = status
            .encode()
            .map_err(|e| Fault::Registrar(TransportError::Send(e.to_string())))?;
        connection.0.send_frame(&frame).map_err(Fault::Registrar)?;

        // An acknowledgement still in flight is abandoned with the connection.
        let Recv::Done(ack) = recv_blocking(Arc::clone(&connection.0), &cancel).await? else {
            break;
        };
        ack.map_err(Fault::Registrar)?;

        tracing::trace!(
            endpoint = %inner.id,
            buffers = %status.buffers(),
            "heartbeat acknowledged"
        );
    }

    tracing::debug!(endpoint = %inner.id, "registrar stopped");
    Ok(())
}
