// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! Sockets live in a registry keyed by `inproc://name` addresses. Each
//! binding is a star: one bound socket plus any number of connected peers of
//! the complementary pattern. Frames travel through unbounded crossbeam
//! inboxes; the sender's high-water mark caps how deep a peer inbox may grow.
//!
//! | Sender | Delivery |
//! |--------|----------|
//! | PUB    | every subscribed peer with room, silently dropped otherwise |
//! | PUSH   | round-robin, `WouldBlock` when no peer has room |
//! | REQ    | round-robin, then strictly one reply |
//! | REP    | routed back to the requester that sent the pending request |
//!
//! Sends never block. Connected sockets do not follow a rebind of their
//! address; they have to be recreated.

use super::{Socket, SocketOption, Transport, TransportError};
use crate::pattern::Pattern;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ADDRESS_SCHEME: &str = "inproc://";

/// Default send high-water mark.
pub const DEFAULT_HWM: usize = 1000;

/// In-process transport registry. Clones share the same address space.
#[derive(Clone, Default)]
pub struct InprocTransport {
    registry: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    bindings: Mutex<HashMap<String, Arc<Binding>>>,
    next_id: AtomicU64,
}

struct Binding {
    bound: Arc<Node>,
    peers: Mutex<Vec<Arc<Node>>>,
    cursor: AtomicUsize,
}

struct Envelope {
    from: u64,
    seq: u64,
    frame: Vec<u8>,
}

/// Receive side of one socket.
struct Node {
    id: u64,
    pattern: Pattern,
    inbox_tx: Sender<Envelope>,
    inbox_rx: Receiver<Envelope>,
    alive: AtomicBool,
    subscribed: AtomicBool,
    closed_tx: Mutex<Option<Sender<()>>>,
    closed_rx: Receiver<()>,
}

impl Node {
    fn new(id: u64, pattern: Pattern) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = channel::unbounded();
        let (closed_tx, closed_rx) = channel::bounded(0);
        Arc::new(Self {
            id,
            pattern,
            inbox_tx,
            inbox_rx,
            alive: AtomicBool::new(true),
            subscribed: AtomicBool::new(false),
            closed_tx: Mutex::new(Some(closed_tx)),
            closed_rx,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn has_room(&self, hwm: usize) -> bool {
        self.is_alive() && (hwm == 0 || self.inbox_rx.len() < hwm)
    }

    fn offer(&self, envelope: Envelope) -> bool {
        self.is_alive() && self.inbox_tx.send(envelope).is_ok()
    }

    /// Mark dead and wake every blocked receiver.
    fn kill(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        self.closed_tx.lock().take();
        was_alive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Bound,
    Connected,
}

/// Request/reply exchange state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Idle,
    Awaiting { seq: u64 },
    Replying { peer: u64, seq: u64 },
}

struct InprocSocket {
    address: String,
    role: Role,
    node: Arc<Node>,
    binding: Arc<Binding>,
    registry: Arc<Registry>,
    hwm: AtomicUsize,
    recv_timeout: Mutex<Option<Duration>>,
    exchange: Mutex<Exchange>,
    next_seq: AtomicU64,
}

impl InprocTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses currently bound.
    pub fn bound_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<_> = self.registry.bindings.lock().keys().cloned().collect();
        addresses.sort();
        addresses
    }

    fn next_id(&self) -> u64 {
        self.registry.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn socket(
        &self,
        address: &str,
        role: Role,
        node: Arc<Node>,
        binding: Arc<Binding>,
    ) -> Arc<dyn Socket> {
        Arc::new(InprocSocket {
            address: address.to_string(),
            role,
            node,
            binding,
            registry: Arc::clone(&self.registry),
            hwm: AtomicUsize::new(DEFAULT_HWM),
            recv_timeout: Mutex::new(None),
            exchange: Mutex::new(Exchange::Idle),
            next_seq: AtomicU64::new(1),
        })
    }
}

impl Transport for InprocTransport {
    fn bind(&self, pattern: Pattern, address: &str) -> Result<Arc<dyn Socket>, TransportError> {
        if !address.starts_with(ADDRESS_SCHEME) {
            return Err(TransportError::Bind(format!(
                "unsupported address {address}, expected {ADDRESS_SCHEME}name"
            )));
        }

        let mut bindings = self.registry.bindings.lock();
        if bindings.get(address).is_some_and(|b| b.bound.is_alive()) {
            return Err(TransportError::Bind(format!("address in use: {address}")));
        }

        let node = Node::new(self.next_id(), pattern);
        let binding = Arc::new(Binding {
            bound: Arc::clone(&node),
            peers: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        });
        bindings.insert(address.to_string(), Arc::clone(&binding));
        drop(bindings);

        tracing::debug!(address, %pattern, "inproc bind");
        Ok(self.socket(address, Role::Bound, node, binding))
    }

    fn connect(&self, pattern: Pattern, address: &str) -> Result<Arc<dyn Socket>, TransportError> {
        let binding = self
            .registry
            .bindings
            .lock()
            .get(address)
            .filter(|b| b.bound.is_alive())
            .cloned()
            .ok_or_else(|| TransportError::Connect(format!("nothing bound at {address}")))?;

        if binding.bound.pattern.peer() != pattern {
            return Err(TransportError::Connect(format!(
                "{pattern} cannot connect to {} at {address}",
                binding.bound.pattern
            )));
        }

        let node = Node::new(self.next_id(), pattern);
        binding.peers.lock().push(Arc::clone(&node));

        tracing::debug!(address, %pattern, "inproc connect");
        Ok(self.socket(address, Role::Connected, node, binding))
    }
}

impl InprocSocket {
    /// Nodes this socket can deliver to.
    fn targets(&self) -> Vec<Arc<Node>> {
        match self.role {
            Role::Bound => self
                .binding
                .peers
                .lock()
                .iter()
                .filter(|p| p.is_alive())
                .cloned()
                .collect(),
            Role::Connected => {
                if self.binding.bound.is_alive() {
                    vec![Arc::clone(&self.binding.bound)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn envelope(&self, seq: u64, frame: &[u8]) -> Envelope {
        Envelope {
            from: self.node.id,
            seq,
            frame: frame.to_vec(),
        }
    }

    /// Hand the frame to the next peer with room, round-robin.
    fn round_robin(&self, seq: u64, frame: &[u8]) -> Result<(), TransportError> {
        let targets = self.targets();
        if targets.is_empty() {
            return Err(TransportError::WouldBlock);
        }

        let hwm = self.hwm.load(Ordering::Relaxed);
        let start = self.binding.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..targets.len() {
            let target = &targets[(start + offset) % targets.len()];
            if target.has_room(hwm) && target.offer(self.envelope(seq, frame)) {
                return Ok(());
            }
        }
        Err(TransportError::WouldBlock)
    }

    fn fan_out(&self, frame: &[u8]) {
        let hwm = self.hwm.load(Ordering::Relaxed);
        for target in self.targets() {
            if target.subscribed.load(Ordering::Acquire) && target.has_room(hwm) {
                target.offer(self.envelope(0, frame));
            }
        }
    }

    fn reply(&self, peer: u64, seq: u64, frame: &[u8]) {
        let target = self.targets().into_iter().find(|t| t.id == peer);
        match target {
            Some(target) => {
                target.offer(self.envelope(seq, frame));
            }
            None => tracing::debug!(address = %self.address, peer, "requester gone, reply dropped"),
        }
    }

    /// Block for the next envelope, up to `deadline`.
    fn wait(&self, deadline: Option<Instant>) -> Result<Envelope, TransportError> {
        if !self.node.is_alive() {
            return Err(TransportError::Destroyed);
        }

        let received = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                select! {
                    recv(self.node.inbox_rx) -> msg => msg.ok(),
                    recv(self.node.closed_rx) -> _ => None,
                    default(remaining) => return Err(TransportError::Timeout),
                }
            }
            None => select! {
                recv(self.node.inbox_rx) -> msg => msg.ok(),
                recv(self.node.closed_rx) -> _ => None,
            },
        };

        match received {
            Some(envelope) if self.node.is_alive() => Ok(envelope),
            _ => Err(TransportError::Destroyed),
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.recv_timeout
            .lock()
            .filter(|t| !t.is_zero())
            .map(|t| Instant::now() + t)
    }
}

impl Socket for InprocSocket {
    fn pattern(&self) -> Pattern {
        self.node.pattern
    }

    fn set_option(&self, option: SocketOption) -> Result<(), TransportError> {
        if !self.node.is_alive() {
            return Err(TransportError::Destroyed);
        }
        match option {
            SocketOption::SubscribeAll => {
                if self.node.pattern != Pattern::Sub {
                    return Err(TransportError::Option(format!(
                        "subscribe on {} socket",
                        self.node.pattern
                    )));
                }
                self.node.subscribed.store(true, Ordering::Release);
            }
            SocketOption::RecvTimeout(timeout) => *self.recv_timeout.lock() = Some(timeout),
            SocketOption::SendHighWaterMark(hwm) => self.hwm.store(hwm, Ordering::Relaxed),
            // Sends never block and there is no network underneath.
            SocketOption::SendTimeout(_)
            | SocketOption::TcpKeepAlive(_)
            | SocketOption::TcpKeepAliveIdle(_)
            | SocketOption::TcpKeepAliveCount(_)
            | SocketOption::HeartbeatInterval(_)
            | SocketOption::HeartbeatTimeout(_)
            | SocketOption::HeartbeatTtl(_)
            | SocketOption::ReconnectInterval(_)
            | SocketOption::ReconnectIntervalMax(_) => {}
        }
        Ok(())
    }

    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.node.is_alive() {
            return Err(TransportError::Destroyed);
        }

        match self.node.pattern {
            Pattern::Sub | Pattern::Pull => Err(TransportError::Unsupported(self.node.pattern)),
            Pattern::Pub => {
                self.fan_out(frame);
                Ok(())
            }
            Pattern::Push => self.round_robin(0, frame),
            Pattern::Req => {
                let mut exchange = self.exchange.lock();
                if *exchange != Exchange::Idle {
                    return Err(TransportError::State("request already pending".into()));
                }
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                self.round_robin(seq, frame)?;
                *exchange = Exchange::Awaiting { seq };
                Ok(())
            }
            Pattern::Rep => {
                let mut exchange = self.exchange.lock();
                let Exchange::Replying { peer, seq } = *exchange else {
                    return Err(TransportError::State("no request to reply to".into()));
                };
                self.reply(peer, seq, frame);
                *exchange = Exchange::Idle;
                Ok(())
            }
        }
    }

    fn recv_frame(&self) -> Result<Vec<u8>, TransportError> {
        match self.node.pattern {
            Pattern::Pub | Pattern::Push => Err(TransportError::Unsupported(self.node.pattern)),
            Pattern::Sub | Pattern::Pull => self.wait(self.deadline()).map(|e| e.frame),
            Pattern::Req => {
                let Exchange::Awaiting { seq } = *self.exchange.lock() else {
                    return Err(TransportError::State("no request pending".into()));
                };
                let deadline = self.deadline();
                loop {
                    match self.wait(deadline) {
                        Ok(envelope) if envelope.seq == seq => {
                            *self.exchange.lock() = Exchange::Idle;
                            return Ok(envelope.frame);
                        }
                        Ok(envelope) => {
                            tracing::trace!(
                                address = %self.address,
                                seq = envelope.seq,
                                "stale reply discarded"
                            );
                        }
                        Err(TransportError::Timeout) => {
                            // Give up on this request; a late reply is discarded by seq.
                            *self.exchange.lock() = Exchange::Idle;
                            return Err(TransportError::Timeout);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Pattern::Rep => {
                if *self.exchange.lock() != Exchange::Idle {
                    return Err(TransportError::State("reply still pending".into()));
                }
                let envelope = self.wait(self.deadline())?;
                *self.exchange.lock() = Exchange::Replying {
                    peer: envelope.from,
                    seq: envelope.seq,
                };
                Ok(envelope.frame)
            }
        }
    }

    fn destroy(&self) {
        if !self.node.kill() {
            return;
        }

        match self.role {
            Role::Bound => {
                let mut bindings = self.registry.bindings.lock();
                if bindings
                    .get(&self.address)
                    .is_some_and(|b| Arc::ptr_eq(b, &self.binding))
                {
                    bindings.remove(&self.address);
                }
            }
            Role::Connected => {
                self.binding
                    .peers
                    .lock()
                    .retain(|p| !Arc::ptr_eq(p, &self.node));
            }
        }
        tracing::debug!(
            address = %self.address,
            pattern = %self.node.pattern,
            "inproc socket destroyed"
        );
    }
}

impl Drop for InprocSocket {
    fn drop(&mut self) {
        self.destroy();
    }
}
