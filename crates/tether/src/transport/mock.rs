// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scriptable transport for testing.
//!
//! Every socket created by a [`MockTransport`] shares the same script and
//! recorders, so a test can keep its own clone and observe what an endpoint
//! did with the handles it was given.

use super::{Socket, SocketOption, Transport, TransportError};
use crate::pattern::Pattern;
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock transport (for testing).
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

struct MockState {
    send_error: Mutex<Option<TransportError>>,
    failing_attaches: AtomicUsize,
    attach_count: AtomicUsize,
    destroy_count: AtomicUsize,
    send_attempts: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
    options: Mutex<Vec<SocketOption>>,
    patterns: Mutex<Vec<(Pattern, bool)>>,
    incoming_tx: Sender<Vec<u8>>,
    incoming_rx: Receiver<Vec<u8>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = channel::unbounded();
        Self {
            state: Arc::new(MockState {
                send_error: Mutex::new(None),
                failing_attaches: AtomicUsize::new(0),
                attach_count: AtomicUsize::new(0),
                destroy_count: AtomicUsize::new(0),
                send_attempts: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                options: Mutex::new(Vec::new()),
                patterns: Mutex::new(Vec::new()),
                incoming_tx,
                incoming_rx,
            }),
        }
    }

    /// Make every send fail with `WouldBlock` (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        *self.state.send_error.lock() = fail.then_some(TransportError::WouldBlock);
    }

    /// Make every send fail with a specific error.
    pub fn fail_sends_with(&self, error: TransportError) {
        *self.state.send_error.lock() = Some(error);
    }

    /// Fail the next `n` bind/connect calls.
    pub fn fail_next_attaches(&self, n: usize) {
        self.state.failing_attaches.store(n, Ordering::SeqCst);
    }

    /// Queue a frame for the next `recv_frame` on any socket.
    pub fn push_incoming(&self, frame: impl Into<Vec<u8>>) {
        // the transport holds the receiver, so this cannot fail
        let _ = self.state.incoming_tx.send(frame.into());
    }

    /// Successful and failed bind/connect calls.
    pub fn attach_count(&self) -> usize {
        self.state.attach_count.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls across all sockets.
    pub fn destroy_count(&self) -> usize {
        self.state.destroy_count.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.state.send_attempts.load(Ordering::SeqCst)
    }

    /// Frames accepted so far.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.sent.lock().clone()
    }

    /// Options applied so far, in order.
    pub fn options(&self) -> Vec<SocketOption> {
        self.state.options.lock().clone()
    }

    /// `(pattern, connected)` of every socket created.
    pub fn sockets(&self) -> Vec<(Pattern, bool)> {
        self.state.patterns.lock().clone()
    }

    fn create(&self, pattern: Pattern, connected: bool) -> Result<Arc<dyn Socket>, TransportError> {
        self.state.attach_count.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .state
            .failing_attaches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(if connected {
                TransportError::Connect("scripted failure".into())
            } else {
                TransportError::Bind("scripted failure".into())
            });
        }

        self.state.patterns.lock().push((pattern, connected));
        let (closed_tx, closed_rx) = channel::bounded(0);
        Ok(Arc::new(MockSocket {
            state: Arc::clone(&self.state),
            pattern,
            destroyed: AtomicBool::new(false),
            closed_tx: Mutex::new(Some(closed_tx)),
            closed_rx,
        }))
    }
}

impl Transport for MockTransport {
    fn bind(&self, pattern: Pattern, _address: &str) -> Result<Arc<dyn Socket>, TransportError> {
        self.create(pattern, false)
    }

    fn connect(&self, pattern: Pattern, _address: &str) -> Result<Arc<dyn Socket>, TransportError> {
        self.create(pattern, true)
    }
}

struct MockSocket {
    state: Arc<MockState>,
    pattern: Pattern,
    destroyed: AtomicBool,
    closed_tx: Mutex<Option<Sender<()>>>,
    closed_rx: Receiver<()>,
}

impl Socket for MockSocket {
    fn pattern(&self) -> Pattern {
        self.pattern
    }

    fn set_option(&self, option: SocketOption) -> Result<(), TransportError> {
        self.state.options.lock().push(option);
        Ok(())
    }

    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.state.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(TransportError::Destroyed);
        }
        if let Some(err) = self.state.send_error.lock().clone() {
            return Err(err);
        }
        self.state.sent.lock().push(frame.to_vec());
        Ok(())
    }

    fn recv_frame(&self) -> Result<Vec<u8>, TransportError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(TransportError::Destroyed);
        }
        select! {
            recv(self.state.incoming_rx) -> frame => frame.map_err(|_| TransportError::Destroyed),
            recv(self.closed_rx) -> _ => Err(TransportError::Destroyed),
        }
    }

    fn destroy(&self) {
        self.state.destroy_count.fetch_add(1, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
        self.closed_tx.lock().take();
    }
}
