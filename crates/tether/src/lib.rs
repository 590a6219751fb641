// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tether - resilient pattern-aware messaging endpoint
//!
//! Wraps one long-lived connection of an external message transport and
//! manages its buffering, retry, shutdown and recovery.
//!
//! # Features
//!
//! - **Six patterns** -- PUB/SUB, PUSH/PULL and REQ/REP
//! - **Bounded retry** -- failed sends are re-attempted with backoff, then dropped and counted
//! - **Graceful drain** -- buffered messages are flushed on shutdown within a deadline
//! - **Self-recovery** -- faulted loops are relaunched after the reconnect interval
//! - **Registrar** -- periodic queue-depth heartbeats to a registry service
//!
//! # Architecture
//!
//! ```text
//! Endpoint
//! +-- inbound queue   (producers -> dispatch loop)
//! +-- outbound queue  (dispatch loop -> consumers)
//! +-- retry queue     (failed sends awaiting resend)
//! +-- dispatch loop   (publisher | consumer | requester | responser)
//! +-- registrar       (optional heartbeat task)
//! +-- supervisor      (relaunches faulted tasks)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether::{Endpoint, EndpointConfig, InprocTransport};
//!
//! let transport = Arc::new(InprocTransport::new());
//!
//! let config = EndpointConfig::builder()
//!     .pattern("push")
//!     .address("inproc://jobs")
//!     .buffer_size(1000)
//!     .build();
//!
//! let push = Endpoint::new(config, transport)?;
//! push.start_publisher()?;
//! push.send(b"hello".to_vec()).await?;
//! push.shutdown().await?;
//! ```

pub mod config;
mod dispatch;
mod drain;
pub mod endpoint;
pub mod error;
pub mod pattern;
mod queue;
pub mod registrar;
pub mod retry;
pub mod stats;
pub mod supervisor;
pub mod transport;

pub use config::{ConfigError, EndpointConfig, EndpointConfigBuilder};
pub use endpoint::{Endpoint, EndpointBuilder, Outbound};
pub use error::{BufferInfo, DrainError, EndpointError, Fault};
pub use pattern::{Pattern, QueueCapacities};
pub use registrar::{CodecError, StatusMessage};
pub use retry::{RetryMessage, DEFAULT_RETRY_ATTEMPTS};
pub use stats::{EndpointStats, StatsSnapshot};
pub use supervisor::{LoopKind, Spawner, Task, TokioSpawner};
pub use transport::inproc::InprocTransport;
pub use transport::mock::MockTransport;
pub use transport::{Socket, SocketOption, Transport, TransportError};
