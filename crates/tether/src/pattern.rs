// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Messaging patterns and the queue sizing they imply.

use crate::error::EndpointError;
use std::fmt;
use std::str::FromStr;

/// Messaging discipline of an endpoint.
///
/// Tags follow the classic socket-type numbering so they stay stable on the
/// registrar wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Fan-out sender
    Pub,
    /// Fan-in receiver of a publisher
    Sub,
    /// Round-robin sender
    Push,
    /// Receiver of a pusher
    Pull,
    /// Client side of request/reply
    Req,
    /// Service side of request/reply
    Rep,
}

/// Capacities of the three endpoint queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCapacities {
    /// Producer -> transport
    pub inbound: usize,
    /// Transport -> consumer
    pub outbound: usize,
    /// Pending resends
    pub retry: usize,
}

/// Single-slot capacity for queues a pattern never really uses.
const MINIMAL_CAPACITY: usize = 1;

impl Pattern {
    /// All supported patterns.
    pub const ALL: [Pattern; 6] = [
        Pattern::Pub,
        Pattern::Sub,
        Pattern::Push,
        Pattern::Pull,
        Pattern::Req,
        Pattern::Rep,
    ];

    /// Integer tag used on the wire.
    pub fn tag(self) -> u32 {
        match self {
            Self::Pub => 1,
            Self::Sub => 2,
            Self::Req => 3,
            Self::Rep => 4,
            Self::Pull => 7,
            Self::Push => 8,
        }
    }

    /// Inverse of [`Pattern::tag`].
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tag() == tag)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pub => "pub",
            Self::Sub => "sub",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Req => "req",
            Self::Rep => "rep",
        }
    }

    /// The pattern a peer must use to talk to this one.
    pub fn peer(self) -> Self {
        match self {
            Self::Pub => Self::Sub,
            Self::Sub => Self::Pub,
            Self::Push => Self::Pull,
            Self::Pull => Self::Push,
            Self::Req => Self::Rep,
            Self::Rep => Self::Req,
        }
    }

    /// PUB and PUSH drain the inbound queue into the transport.
    pub fn is_sender(self) -> bool {
        matches!(self, Self::Pub | Self::Push)
    }

    /// SUB and PULL fill the outbound queue from the transport.
    pub fn is_receiver(self) -> bool {
        matches!(self, Self::Sub | Self::Pull)
    }

    /// REQ and REP alternate strictly between send and receive.
    pub fn is_request_reply(self) -> bool {
        matches!(self, Self::Req | Self::Rep)
    }

    /// Queue capacities for a configured buffer size.
    ///
    /// Sending patterns buffer on the inbound side, receiving patterns on the
    /// outbound side, request/reply keeps a single slot everywhere.
    pub fn queue_capacities(self, buffer_size: usize) -> QueueCapacities {
        let buffer_size = buffer_size.max(MINIMAL_CAPACITY);
        if self.is_sender() {
            QueueCapacities {
                inbound: buffer_size,
                outbound: MINIMAL_CAPACITY,
                retry: buffer_size,
            }
        } else if self.is_receiver() {
            QueueCapacities {
                inbound: MINIMAL_CAPACITY,
                outbound: buffer_size,
                retry: MINIMAL_CAPACITY,
            }
        } else {
            QueueCapacities {
                inbound: MINIMAL_CAPACITY,
                outbound: MINIMAL_CAPACITY,
                retry: MINIMAL_CAPACITY,
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pub" => Ok(Self::Pub),
            "sub" => Ok(Self::Sub),
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "req" => Ok(Self::Req),
            "rep" => Ok(Self::Rep),
            _ => Err(EndpointError::InvalidPattern(s.to_string())),
        }
    }
}
