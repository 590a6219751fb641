// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint error types.
//!
//! [`EndpointError`] and [`DrainError`] are returned to callers. [`Fault`]
//! never leaves the crate's managed tasks: loop bodies return it and the
//! supervisor decides whether to relaunch.

use crate::config::ConfigError;
use crate::pattern::Pattern;
use crate::supervisor::LoopKind;
use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Caller-facing endpoint errors.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("wrong socket mode: {0}")]
    InvalidPattern(String),

    #[error("{kind} only enables by pattern {expected}, endpoint is {actual}")]
    WrongPattern {
        kind: LoopKind,
        expected: &'static str,
        actual: Pattern,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("inbound queue is full")]
    Full,

    #[error("endpoint is closed")]
    Closed,
}

/// Internal fault terminating one managed task.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("attach failed: {0}")]
    Attach(TransportError),

    #[error("transport destroyed while in use")]
    Destroyed,

    #[error("request/reply protocol violated: {0}")]
    Protocol(TransportError),

    #[error("registrar failed: {0}")]
    Registrar(TransportError),

    #[error("endpoint already closed")]
    Closed,

    #[error("blocking transport call aborted: {0}")]
    Aborted(String),
}

/// Messages still buffered in each queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferInfo {
    pub inbound: usize,
    pub outbound: usize,
    pub retry: usize,
}

impl BufferInfo {
    /// Total buffered messages.
    pub fn total(&self) -> usize {
        self.inbound + self.outbound + self.retry
    }

    /// True when no queue holds anything.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for BufferInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in: [{}], out: [{}], retry: [{}]",
            self.inbound, self.outbound, self.retry
        )
    }
}

/// Release could not flush every queue before the exit-wait timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrainError {
    #[error("exit wait timeout with undelivered messages: {0}")]
    Timeout(BufferInfo),
}

impl DrainError {
    /// Leftover counts at the moment the transport was destroyed.
    pub fn leftovers(&self) -> BufferInfo {
        match self {
            Self::Timeout(info) => *info,
        }
    }
}
