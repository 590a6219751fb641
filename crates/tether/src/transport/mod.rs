// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction
//!
//! The endpoint never speaks a wire protocol itself. It only needs a handle
//! that can be bound or connected, configured, used to send and receive
//! whole frames, and destroyed:
//!
//! ```text
//! Transport::bind / Transport::connect -> Arc<dyn Socket>
//! Socket::set_option / send_frame / recv_frame / destroy
//! ```
//!
//! # Contract
//!
//! - `send_frame` must not block beyond the configured send timeout; a full
//!   peer is reported as [`TransportError::WouldBlock`].
//! - `recv_frame` may block. It must return [`TransportError::Destroyed`] once
//!   `destroy` has been called, including for a call already in flight.
//! - `destroy` must be safe to call more than once.
//!
//! Two implementations ship with the crate: [`inproc::InprocTransport`] for
//! in-process messaging and [`mock::MockTransport`] for tests.

pub mod inproc;
pub mod mock;

use crate::pattern::Pattern;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("peer queue full")]
    WouldBlock,

    #[error("operation timed out")]
    Timeout,

    #[error("socket destroyed")]
    Destroyed,

    #[error("operation not valid in current socket state: {0}")]
    State(String),

    #[error("operation not supported by {0} socket")]
    Unsupported(Pattern),

    #[error("invalid option: {0}")]
    Option(String),

    #[error("send failed: {0}")]
    Send(String),
}

/// Options applied to a socket right after bind/connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOption {
    /// SUB only: receive every published frame.
    SubscribeAll,
    SendTimeout(Duration),
    RecvTimeout(Duration),
    TcpKeepAlive(bool),
    /// Seconds; -1 keeps the OS default.
    TcpKeepAliveIdle(i32),
    /// Probe count; -1 keeps the OS default.
    TcpKeepAliveCount(i32),
    HeartbeatInterval(Duration),
    HeartbeatTimeout(Duration),
    HeartbeatTtl(Duration),
    ReconnectInterval(Duration),
    ReconnectIntervalMax(Duration),
    SendHighWaterMark(usize),
}

/// One bound or connected transport handle.
pub trait Socket: Send + Sync {
    /// Pattern the socket was created with.
    fn pattern(&self) -> Pattern;

    /// Apply a socket option.
    fn set_option(&self, option: SocketOption) -> Result<(), TransportError>;

    /// Send a single frame.
    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive a single frame, blocking up to the receive timeout.
    fn recv_frame(&self) -> Result<Vec<u8>, TransportError>;

    /// Tear the socket down and unblock pending receives.
    fn destroy(&self);
}

/// Factory for transport handles.
pub trait Transport: Send + Sync {
    /// Create a socket listening on `address`.
    fn bind(&self, pattern: Pattern, address: &str) -> Result<Arc<dyn Socket>, TransportError>;

    /// Create a socket connected to `address`.
    fn connect(&self, pattern: Pattern, address: &str)
        -> Result<Arc<dyn Socket>, TransportError>;
}
