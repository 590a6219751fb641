// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The messaging endpoint.
//!
//! An [`Endpoint`] owns one transport address, the three queues between the
//! application and the transport, the counters and the lifecycle flags. It is
//! a cheap handle: clones share the same state.
//!
//! Lifecycle:
//!
//! ```text
//! new() -> start_*() [attach] -> running -> cancel -> release -> closed
//! ```
//!
//! A closed endpoint is never reused.

use crate::config::EndpointConfig;
use crate::drain;
use crate::error::{BufferInfo, DrainError, EndpointError, Fault};
use crate::pattern::{Pattern, QueueCapacities};
use crate::queue::Queue;
use crate::retry::RetryMessage;
use crate::stats::{EndpointStats, StatsSnapshot};
use crate::supervisor::{self, LoopKind, Spawner, TokioSpawner};
use crate::transport::{Socket, SocketOption, Transport, TransportError};
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tokio_util::sync::CancellationToken;

/// The live transport handle of an endpoint.
pub(crate) struct SocketHandle {
    socket: Arc<dyn Socket>,
    destroyed: AtomicBool,
}

impl SocketHandle {
    fn new(socket: Arc<dyn Socket>) -> Self {
        Self {
            socket,
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(TransportError::Destroyed);
        }
        self.socket.send_frame(frame)
    }

    /// Shared socket for blocking receives.
    pub(crate) fn socket(&self) -> Arc<dyn Socket> {
        Arc::clone(&self.socket)
    }

    /// Destroy once. Returns `true` for the call that did it.
    pub(crate) fn destroy(&self) -> bool {
        let first = self
            .destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.socket.destroy();
        }
        first
    }
}

pub(crate) struct Inner {
    pub(crate) id: String,
    pub(crate) pattern: Pattern,
    pub(crate) config: EndpointConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) spawner: Arc<dyn Spawner>,
    /// Observed by every loop.
    pub(crate) cancel: CancellationToken,
    /// Fired once release has finished.
    pub(crate) released: CancellationToken,
    pub(crate) inbound: Queue<Vec<u8>>,
    pub(crate) outbound: Queue<Vec<u8>>,
    pub(crate) retry: Queue<RetryMessage>,
    pub(crate) stats: EndpointStats,
    pub(crate) socket: ArcSwapOption<SocketHandle>,
    pub(crate) closed: AtomicBool,
    pub(crate) auto_restart: AtomicBool,
    pub(crate) release_outcome: OnceCell<Result<(), DrainError>>,
    registrar_warned: AtomicBool,
}

impl Inner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn buffer_info(&self) -> BufferInfo {
        BufferInfo {
            inbound: self.inbound.len(),
            outbound: self.outbound.len(),
            retry: self.retry.len(),
        }
    }

    /// Bind or connect a fresh socket, replacing any stale one.
    pub(crate) fn attach(&self) -> Result<Arc<SocketHandle>, Fault> {
        if self.is_closed() {
            return Err(Fault::Closed);
        }

        if let Some(stale) = self.socket.swap(None) {
            if stale.destroy() {
                tracing::debug!(endpoint = %self.id, "stale socket destroyed");
            }
        }

        let address = &self.config.address;
        let socket = if self.config.attach {
            self.transport.connect(self.pattern, address)
        } else {
            self.transport.bind(self.pattern, address)
        }
        .map_err(Fault::Attach)?;

        let handle = Arc::new(SocketHandle::new(socket));
        if let Err(e) = self.apply_options(&handle) {
            handle.destroy();
            return Err(Fault::Attach(e));
        }

        self.socket.store(Some(Arc::clone(&handle)));

        // Release may have swept the slot between the check above and the store.
        if self.is_closed() {
            if let Some(handle) = self.socket.swap(None) {
                handle.destroy();
            }
            return Err(Fault::Closed);
        }

        tracing::info!(
            endpoint = %self.id,
            pattern = %self.pattern,
            address = %address,
            connect = self.config.attach,
            "attached"
        );
        Ok(handle)
    }

    fn apply_options(&self, handle: &SocketHandle) -> Result<(), TransportError> {
        let config = &self.config;
        let socket = &handle.socket;

        if self.pattern == Pattern::Sub {
            socket.set_option(SocketOption::SubscribeAll)?;
        }
        socket.set_option(SocketOption::SendTimeout(config.send_timeout()))?;
        socket.set_option(SocketOption::RecvTimeout(config.recv_timeout()))?;

        if config.tcp_keepalive {
            socket.set_option(SocketOption::TcpKeepAlive(true))?;
            socket.set_option(SocketOption::TcpKeepAliveIdle(config.tcp_keepalive_idle_secs))?;
            socket.set_option(SocketOption::TcpKeepAliveCount(config.tcp_keepalive_count))?;
        }

        if config.heartbeat_interval_secs > 0 {
            socket.set_option(SocketOption::HeartbeatInterval(config.heartbeat_interval()))?;
        }
        if config.heartbeat_timeout_secs > 0 {
            socket.set_option(SocketOption::HeartbeatTimeout(config.heartbeat_timeout()))?;
        }
        if config.heartbeat_ttl_secs > 0 {
            socket.set_option(SocketOption::HeartbeatTtl(config.heartbeat_ttl()))?;
        }

        socket.set_option(SocketOption::ReconnectInterval(config.reconnect_interval()))?;
        if config.reconnect_interval_max_ms > 0 {
            socket.set_option(SocketOption::ReconnectIntervalMax(
                config.reconnect_interval_max(),
            ))?;
        }
        socket.set_option(SocketOption::SendHighWaterMark(config.send_hwm))?;
        Ok(())
    }

    /// Mark closed and destroy the live socket. Only the first call acts.
    pub(crate) fn close_socket(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Some(handle) = self.socket.swap(None) {
            handle.destroy();
        }
        true
    }
}

/// Resilient pattern-aware messaging endpoint.
#[derive(Clone)]
pub struct Endpoint {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.inner.id)
            .field("pattern", &self.inner.pattern)
            .field("address", &self.inner.config.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Endpoint {
    /// Create an endpoint with the default spawner and a fresh cancellation
    /// token.
    pub fn new(
        config: EndpointConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, EndpointError> {
        Self::builder(transport).config(config).build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> EndpointBuilder {
        EndpointBuilder {
            transport,
            config: EndpointConfig::default(),
            spawner: None,
            cancel: None,
            inbound: None,
            outbound: None,
        }
    }

    /// Random v4 UUID.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn pattern(&self) -> Pattern {
        self.inner.pattern
    }

    pub fn address(&self) -> &str {
        &self.inner.config.address
    }

    /// Resolved configuration, request/reply timeout defaults applied.
    pub fn config(&self) -> &EndpointConfig {
        &self.inner.config
    }

    /// Producer side of the inbound queue.
    pub fn inbound(&self) -> mpsc::Sender<Vec<u8>> {
        self.inner.inbound.sender()
    }

    /// Consumer side of the outbound queue.
    pub fn outbound(&self) -> Outbound {
        Outbound {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Enqueue a frame for sending, waiting for room.
    pub async fn send(&self, frame: impl Into<Vec<u8>>) -> Result<(), EndpointError> {
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }
        self.inner
            .inbound
            .push(frame.into())
            .await
            .map_err(|_| EndpointError::Closed)
    }

    /// Enqueue a frame for sending without waiting.
    pub fn try_send(&self, frame: impl Into<Vec<u8>>) -> Result<(), EndpointError> {
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }
        match self.inner.inbound.sender().try_send(frame.into()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(EndpointError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EndpointError::Closed),
        }
    }

    /// Next received frame; `None` once released and empty.
    pub async fn recv_outbound(&self) -> Option<Vec<u8>> {
        self.outbound().recv().await
    }

    pub fn try_recv_outbound(&self) -> Option<Vec<u8>> {
        self.outbound().try_recv()
    }

    /// Queue capacities fixed at construction.
    pub fn capacities(&self) -> QueueCapacities {
        QueueCapacities {
            inbound: self.inner.inbound.capacity(),
            outbound: self.inner.outbound.capacity(),
            retry: self.inner.retry.capacity(),
        }
    }

    pub fn inbound_len(&self) -> usize {
        self.inner.inbound.len()
    }

    pub fn outbound_len(&self) -> usize {
        self.inner.outbound.len()
    }

    pub fn retry_len(&self) -> usize {
        self.inner.retry.len()
    }

    /// Current depth of all three queues.
    pub fn buffer_info(&self) -> BufferInfo {
        self.inner.buffer_info()
    }

    pub fn is_buffer_empty(&self) -> bool {
        self.buffer_info().is_empty()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn is_auto_restart(&self) -> bool {
        self.inner.auto_restart.load(Ordering::Acquire)
    }

    /// Stop relaunching faulted tasks. Cannot be undone.
    pub fn stop_auto_restart(&self) {
        if self.inner.auto_restart.swap(false, Ordering::AcqRel) {
            tracing::debug!(endpoint = %self.inner.id, "auto-restart disabled");
        }
    }

    /// True once the transport has been torn down for good.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Token observed by every loop of this endpoint.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Start the PUB/PUSH dispatch loop.
    pub fn start_publisher(&self) -> Result<(), EndpointError> {
        self.start(LoopKind::Publisher)
    }

    /// Start the SUB/PULL receive loop.
    pub fn start_consumer(&self) -> Result<(), EndpointError> {
        self.start(LoopKind::Consumer)
    }

    /// Start the REQ loop.
    pub fn start_requester(&self) -> Result<(), EndpointError> {
        self.start(LoopKind::Requester)
    }

    /// Start the REP loop.
    pub fn start_responser(&self) -> Result<(), EndpointError> {
        self.start(LoopKind::Responser)
    }

    /// Start the registry heartbeat. A no-op (with a one-time warning) when no
    /// registry address is configured.
    pub fn start_registrar(&self) -> Result<(), EndpointError> {
        if self.inner.config.registry_address.is_none() {
            if !self.inner.registrar_warned.swap(true, Ordering::AcqRel) {
                tracing::warn!(
                    endpoint = %self.inner.id,
                    "no registry address configured, registrar disabled"
                );
            }
            return Ok(());
        }
        self.start(LoopKind::Registrar)
    }

    fn start(&self, kind: LoopKind) -> Result<(), EndpointError> {
        if self.is_closed() || self.inner.cancel.is_cancelled() {
            return Err(EndpointError::Closed);
        }
        if !kind.accepts(self.inner.pattern) {
            return Err(EndpointError::WrongPattern {
                kind,
                expected: kind.expected(),
                actual: self.inner.pattern,
            });
        }
        supervisor::launch(self.clone(), kind);
        Ok(())
    }

    /// Flush queues and tear the transport down.
    ///
    /// Runs at most once; every caller gets the same outcome.
    pub async fn release(&self) -> Result<(), DrainError> {
        self.inner
            .release_outcome
            .get_or_init(|| drain::release(&self.inner))
            .await
            .clone()
    }

    /// Stop every loop and release.
    pub async fn shutdown(&self) -> Result<(), DrainError> {
        self.stop_auto_restart();
        self.inner.cancel.cancel();
        self.release().await
    }

    pub(crate) fn spawner(&self) -> Arc<dyn Spawner> {
        Arc::clone(&self.inner.spawner)
    }

    pub(crate) fn record_restart(&self) {
        self.inner.stats.record_restart();
    }
}

/// Receive side of an endpoint's outbound queue.
#[derive(Clone)]
pub struct Outbound {
    inner: Arc<Inner>,
}

impl Outbound {
    /// Wait for the next frame. Returns `None` once the endpoint is released
    /// and nothing is left.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        let mut rx = self.inner.outbound.lock().await;
        tokio::select! {
            biased;
            frame = rx.recv() => frame,
            _ = self.inner.released.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Take a frame if one is ready.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.inner.outbound.try_lock()?.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.outbound.is_empty()
    }
}

/// Builder for [`Endpoint`].
pub struct EndpointBuilder {
    transport: Arc<dyn Transport>,
    config: EndpointConfig,
    spawner: Option<Arc<dyn Spawner>>,
    cancel: Option<CancellationToken>,
    inbound: Option<Channel>,
    outbound: Option<Channel>,
}

type Channel = (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>);

/// Caller-made channel if the pattern buffers that side, else a fresh queue.
fn queue(supplied: Option<Channel>, buffered: bool, capacity: usize, side: &str) -> Queue<Vec<u8>> {
    match supplied {
        Some((tx, rx)) if buffered => Queue::from_channel(tx, rx),
        Some(_) => {
            tracing::debug!(side, "supplied channel ignored by this pattern");
            Queue::new(capacity)
        }
        None => Queue::new(capacity),
    }
}

impl EndpointBuilder {
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Run managed tasks through a custom spawner.
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Tie the endpoint to an outer token. Cancelling it stops every loop;
    /// shutting the endpoint down never cancels the parent.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Use a caller-made channel as the inbound queue of a PUB/PUSH endpoint.
    ///
    /// Keep a clone of `tx` to feed the endpoint directly. The channel's bound
    /// replaces `buffer_size` for this queue. Other patterns ignore it.
    pub fn inbound_channel(
        mut self,
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        self.inbound = Some((tx, rx));
        self
    }

    /// Use a caller-made channel as the outbound queue of a SUB/PULL endpoint.
    ///
    /// Keep a clone of `tx` to inject frames next to received ones. The
    /// channel's bound replaces `buffer_size` for this queue. Other patterns
    /// ignore it.
    pub fn outbound_channel(
        mut self,
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        self.outbound = Some((tx, rx));
        self
    }

    pub fn build(self) -> Result<Endpoint, EndpointError> {
        let pattern: Pattern = self.config.pattern.parse()?;
        self.config.validate()?;

        let config = if pattern.is_request_reply() {
            self.config.with_request_reply_defaults()
        } else {
            self.config
        };

        let caps = pattern.queue_capacities(config.buffer_size);
        let inbound = queue(self.inbound, pattern.is_sender(), caps.inbound, "inbound");
        let outbound = queue(self.outbound, pattern.is_receiver(), caps.outbound, "outbound");
        let cancel = match self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let id = uuid::Uuid::new_v4().to_string();

        tracing::debug!(
            endpoint = %id,
            %pattern,
            address = %config.address,
            inbound = inbound.capacity(),
            outbound = outbound.capacity(),
            retry = caps.retry,
            "endpoint created"
        );

        Ok(Endpoint {
            inner: Arc::new(Inner {
                id,
                pattern,
                auto_restart: AtomicBool::new(!config.disable_restart),
                config,
                transport: self.transport,
                spawner: self.spawner.unwrap_or_else(|| Arc::new(TokioSpawner)),
                cancel,
                released: CancellationToken::new(),
                inbound,
                outbound,
                retry: Queue::new(caps.retry),
                stats: EndpointStats::new(),
                socket: ArcSwapOption::empty(),
                closed: AtomicBool::new(false),
                release_outcome: OnceCell::new(),
                registrar_warned: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    fn config(pattern: &str) -> EndpointConfig {
        EndpointConfig::builder()
            .pattern(pattern)
            .address("mock://endpoint")
            .buffer_size(8)
            .build()
    }

    fn endpoint(pattern: &str) -> (Endpoint, MockTransport) {
        let transport = MockTransport::new();
        let ep = Endpoint::new(config(pattern), Arc::new(transport.clone())).unwrap();
        (ep, transport)
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Endpoint::new(config("dealer"), Arc::new(MockTransport::new())).unwrap_err();
        assert!(matches!(err, EndpointError::InvalidPattern(_)));
    }

    #[test]
    fn test_invalid_config() {
        let cfg = EndpointConfig::builder().pattern("push").build();
        let err = Endpoint::new(cfg, Arc::new(MockTransport::new())).unwrap_err();
        assert!(matches!(err, EndpointError::Config(_)));
    }

    #[test]
    fn test_identity_and_capacities() {
        let (push, _) = endpoint("PUSH");
        let (other, _) = endpoint("push");
        assert_eq!(push.pattern(), Pattern::Push);
        assert_eq!(push.id().len(), 36);
        assert_ne!(push.id(), other.id());
        assert_eq!(push.capacities(), Pattern::Push.queue_capacities(8));
        assert_eq!(push.capacities().outbound, 1);
    }

    #[test]
    fn test_request_reply_timeouts_default() {
        let (req, _) = endpoint("req");
        assert_eq!(req.config().send_timeout(), Duration::from_secs(3));
        assert_eq!(req.config().recv_timeout(), Duration::from_secs(3));

        let (push, _) = endpoint("push");
        assert_eq!(push.config().recv_timeout(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_wrong_pattern_is_synchronous() {
        let (pull, transport) = endpoint("pull");
        let err = pull.start_publisher().unwrap_err();
        assert!(matches!(
            err,
            EndpointError::WrongPattern {
                kind: LoopKind::Publisher,
                ..
            }
        ));
        assert!(matches!(
            pull.start_requester(),
            Err(EndpointError::WrongPattern { .. })
        ));
        assert_eq!(transport.attach_count(), 0);
    }

    #[tokio::test]
    async fn test_try_send_full() {
        let (push, _) = endpoint("push");
        for i in 0..8u8 {
            push.try_send(vec![i]).unwrap();
        }
        assert!(matches!(push.try_send(vec![9]), Err(EndpointError::Full)));
        assert_eq!(push.inbound_len(), 8);
        assert_eq!(push.buffer_info().inbound, 8);
        assert!(!push.is_buffer_empty());
    }

    #[test]
    fn test_attach_applies_options() {
        let transport = MockTransport::new();
        let cfg = EndpointConfig::builder()
            .pattern("sub")
            .address("mock://opts")
            .attach(true)
            .heartbeat(0, 5, 0)
            .tcp_keepalive(30, 4)
            .reconnect_interval_max(Duration::from_secs(2))
            .build();
        let ep = Endpoint::new(cfg, Arc::new(transport.clone())).unwrap();

        ep.inner.attach().unwrap();

        let options = transport.options();
        assert_eq!(options[0], SocketOption::SubscribeAll);
        assert!(options.contains(&SocketOption::TcpKeepAliveIdle(30)));
        assert!(options.contains(&SocketOption::TcpKeepAliveCount(4)));
        assert!(options.contains(&SocketOption::HeartbeatTimeout(Duration::from_secs(5))));
        assert!(!options.iter().any(|o| matches!(
            o,
            SocketOption::HeartbeatInterval(_) | SocketOption::HeartbeatTtl(_)
        )));
        assert!(options.contains(&SocketOption::ReconnectIntervalMax(Duration::from_secs(2))));
        assert_eq!(transport.sockets(), vec![(Pattern::Sub, true)]);
    }

    #[test]
    fn test_keepalive_and_reconnect_max_skipped_by_default() {
        let (push, transport) = endpoint("push");
        push.inner.attach().unwrap();

        let options = transport.options();
        assert!(!options.contains(&SocketOption::SubscribeAll));
        assert!(!options.iter().any(|o| matches!(
            o,
            SocketOption::TcpKeepAlive(_) | SocketOption::ReconnectIntervalMax(_)
        )));
        assert!(options.contains(&SocketOption::SendHighWaterMark(10_000)));
    }

    #[test]
    fn test_reattach_destroys_stale_socket() {
        let (push, transport) = endpoint("push");
        push.inner.attach().unwrap();
        push.inner.attach().unwrap();
        assert_eq!(transport.attach_count(), 2);
        assert_eq!(transport.destroy_count(), 1);
    }

    #[test]
    fn test_attach_after_close() {
        let (push, transport) = endpoint("push");
        push.inner.attach().unwrap();
        assert!(push.inner.close_socket());
        assert!(!push.inner.close_socket());
        assert!(matches!(push.inner.attach(), Err(Fault::Closed)));
        assert_eq!(transport.destroy_count(), 1);
        assert!(push.is_closed());
    }

    #[test]
    fn test_attach_failure_is_fault() {
        let (push, transport) = endpoint("push");
        transport.fail_next_attaches(1);
        assert!(matches!(push.inner.attach(), Err(Fault::Attach(_))));
        assert!(push.inner.socket.load().is_none());
    }

    #[test]
    fn test_stop_auto_restart_is_one_way() {
        let (push, _) = endpoint("push");
        assert!(push.is_auto_restart());
        push.stop_auto_restart();
        push.stop_auto_restart();
        assert!(!push.is_auto_restart());

        let cfg = EndpointConfig {
            disable_restart: true,
            ..config("push")
        };
        let ep = Endpoint::new(cfg, Arc::new(MockTransport::new())).unwrap();
        assert!(!ep.is_auto_restart());
    }

    #[tokio::test]
    async fn test_parent_token_cancels_endpoint() {
        let parent = CancellationToken::new();
        let ep = Endpoint::builder(Arc::new(MockTransport::new()))
            .config(config("push"))
            .cancel_token(parent.clone())
            .build()
            .unwrap();

        parent.cancel();
        assert!(ep.cancel_token().is_cancelled());
        assert!(matches!(ep.start_publisher(), Err(EndpointError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let ep = Endpoint::builder(Arc::new(MockTransport::new()))
            .config(config("push"))
            .cancel_token(parent.clone())
            .build()
            .unwrap();

        ep.shutdown().await.unwrap();
        assert!(!parent.is_cancelled());
        assert!(ep.is_closed());
        assert!(matches!(ep.send(vec![1]).await, Err(EndpointError::Closed)));
    }

    #[tokio::test]
    async fn test_supplied_inbound_channel() {
        let transport = MockTransport::new();
        let (tx, rx) = mpsc::channel(3);
        let feed = tx.clone();
        let push = Endpoint::builder(Arc::new(transport.clone()))
            .config(config("push"))
            .inbound_channel(tx, rx)
            .build()
            .unwrap();
        assert_eq!(push.capacities().inbound, 3);

        push.start_publisher().unwrap();
        feed.send(b"direct".to_vec()).await.unwrap();
        for _ in 0..100 {
            if push.stats().sent == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.sent_frames(), vec![b"direct".to_vec()]);
        assert!(push.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_supplied_outbound_channel() {
        let (tx, rx) = mpsc::channel(2);
        let feed = tx.clone();
        let pull = Endpoint::builder(Arc::new(MockTransport::new()))
            .config(config("pull"))
            .outbound_channel(tx, rx)
            .build()
            .unwrap();
        assert_eq!(pull.capacities().outbound, 2);

        feed.send(b"injected".to_vec()).await.unwrap();
        assert_eq!(pull.outbound_len(), 1);
        assert_eq!(pull.try_recv_outbound(), Some(b"injected".to_vec()));
    }

    #[test]
    fn test_supplied_channel_ignored_by_other_side() {
        let (tx, rx) = mpsc::channel(50);
        let push = Endpoint::builder(Arc::new(MockTransport::new()))
            .config(config("push"))
            .outbound_channel(tx, rx)
            .build()
            .unwrap();
        assert_eq!(push.capacities(), Pattern::Push.queue_capacities(8));

        let (tx, rx) = mpsc::channel(50);
        let req = Endpoint::builder(Arc::new(MockTransport::new()))
            .config(config("req"))
            .inbound_channel(tx, rx)
            .build()
            .unwrap();
        assert_eq!(req.capacities().inbound, 1);
    }

    #[tokio::test]
    async fn test_start_registrar_without_address_is_noop() {
        let (push, transport) = endpoint("push");
        push.start_registrar().unwrap();
        push.start_registrar().unwrap();
        assert_eq!(transport.attach_count(), 0);
    }
}
