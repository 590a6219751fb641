// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Task spawning and fault recovery.
//!
//! Every managed loop runs inside [`supervise`]. A loop ends either cleanly
//! (cancellation observed) or with a [`Fault`]. On a fault the supervisor logs
//! it and, while auto-restart is on, waits the reconnect interval and launches
//! the same loop again as a fresh task.

use crate::dispatch;
use crate::endpoint::Endpoint;
use crate::error::Fault;
use crate::pattern::Pattern;
use crate::registrar;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::Instrument;

/// A boxed task handed to a [`Spawner`].
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs managed tasks. Inject your own to control where loops execute.
pub trait Spawner: Send + Sync {
    /// Spawn `task`, detached. `name` identifies the loop kind.
    fn spawn(&self, name: &'static str, task: Task);
}

/// Spawns onto the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, name: &'static str, task: Task) {
        tokio::spawn(task.instrument(tracing::debug_span!("tether_task", task = name)));
    }
}

/// Managed loop kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Publisher,
    Consumer,
    Requester,
    Responser,
    Registrar,
}

impl LoopKind {
    /// Stable name used in logs and spawned task names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Consumer => "consumer",
            Self::Requester => "requester",
            Self::Responser => "responser",
            Self::Registrar => "registrar",
        }
    }

    /// Patterns the loop can run on, for error messages.
    pub fn expected(self) -> &'static str {
        match self {
            Self::Publisher => "push/pub",
            Self::Consumer => "pull/sub",
            Self::Requester => "req",
            Self::Responser => "rep",
            Self::Registrar => "any",
        }
    }

    pub fn accepts(self, pattern: Pattern) -> bool {
        match self {
            Self::Publisher => pattern.is_sender(),
            Self::Consumer => pattern.is_receiver(),
            Self::Requester => pattern == Pattern::Req,
            Self::Responser => pattern == Pattern::Rep,
            Self::Registrar => true,
        }
    }
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Spawn `kind` for `endpoint` under supervision.
pub(crate) fn launch(endpoint: Endpoint, kind: LoopKind) {
    let spawner = endpoint.spawner();
    spawner.spawn(kind.tag(), Box::pin(supervise(endpoint, kind)));
}

async fn run(endpoint: &Endpoint, kind: LoopKind) -> Result<(), Fault> {
    match kind {
        LoopKind::Publisher => dispatch::publisher::run(endpoint).await,
        LoopKind::Consumer => dispatch::consumer::run(endpoint).await,
        LoopKind::Requester => dispatch::request::run_requester(endpoint).await,
        LoopKind::Responser => dispatch::request::run_responser(endpoint).await,
        LoopKind::Registrar => registrar::run(endpoint).await,
    }
}

async fn supervise(endpoint: Endpoint, kind: LoopKind) {
    let id = endpoint.id().to_string();
    tracing::debug!(endpoint = %id, task = kind.tag(), "task started");

    let fault = match run(&endpoint, kind).await {
        Ok(()) => {
            tracing::debug!(endpoint = %id, task = kind.tag(), "task finished");
            return;
        }
        Err(fault) => fault,
    };

    tracing::error!(endpoint = %id, task = kind.tag(), error = %fault, "task faulted");

    let cancel = endpoint.cancel_token();

    if !endpoint.is_auto_restart() {
        tracing::info!(
            endpoint = %id,
            task = kind.tag(),
            "auto-restart disabled, task not relaunched"
        );
        if cancel.is_cancelled() {
            release_after_fault(&endpoint, kind).await;
        }
        return;
    }

    tokio::select! {
        _ = tokio::time::sleep(endpoint.config().reconnect_interval()) => {}
        _ = cancel.cancelled() => {
            tracing::debug!(
                endpoint = %id,
                task = kind.tag(),
                "relaunch abandoned on cancellation"
            );
            release_after_fault(&endpoint, kind).await;
            return;
        }
    }

    if cancel.is_cancelled() {
        release_after_fault(&endpoint, kind).await;
        return;
    }
    // Release may have run while we slept.
    if !endpoint.is_auto_restart() || endpoint.is_closed() {
        return;
    }

    endpoint.record_restart();
    tracing::info!(endpoint = %id, task = kind.tag(), "relaunching task");
    launch(endpoint, kind);
}

/// A faulted task cancelled before its relaunch still owes the endpoint its
/// release.
async fn release_after_fault(endpoint: &Endpoint, kind: LoopKind) {
    if let Err(e) = endpoint.release().await {
        tracing::debug!(
            endpoint = %endpoint.id(),
            task = kind.tag(),
            error = %e,
            "release reported leftovers"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fault_after_cancel_releases_without_restart() {
        let transport = MockTransport::new();
        transport.fail_next_attaches(1);
        let config = EndpointConfig::builder()
            .pattern("push")
            .address("mock://supervisor")
            .exit_wait_timeout(Duration::from_millis(100))
            .build();
        let ep = Endpoint::new(config, Arc::new(transport.clone())).unwrap();
        ep.stop_auto_restart();
        ep.cancel_token().cancel();

        supervise(ep.clone(), LoopKind::Publisher).await;

        assert!(ep.is_closed());
        assert_eq!(transport.attach_count(), 1);
        assert_eq!(ep.stats().restarts, 0);
        assert_eq!(ep.recv_outbound().await, None);
    }

    #[test]
    fn test_loop_kind_accepts() {
        assert!(LoopKind::Publisher.accepts(Pattern::Pub));
        assert!(LoopKind::Publisher.accepts(Pattern::Push));
        assert!(!LoopKind::Publisher.accepts(Pattern::Pull));
        assert!(LoopKind::Consumer.accepts(Pattern::Sub));
        assert!(!LoopKind::Consumer.accepts(Pattern::Req));
        assert!(LoopKind::Requester.accepts(Pattern::Req));
        assert!(!LoopKind::Responser.accepts(Pattern::Req));
        for pattern in Pattern::ALL {
            assert!(LoopKind::Registrar.accepts(pattern));
        }
    }

    #[test]
    fn test_loop_kind_display() {
        assert_eq!(LoopKind::Responser.to_string(), "responser");
        assert_eq!(LoopKind::Consumer.expected(), "pull/sub");
    }
}
