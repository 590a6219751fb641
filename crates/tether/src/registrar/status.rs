// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registrar heartbeat message and its wire format.
//!
//! Fixed binary layout, all integers big-endian:
//!
//! ```text
//! +--------+---------+-----------+-------------+-----+-----+-------+---------+---------+----------+
//! | "TTHR" | version | id        | host        | in  | out | retry | pattern | ts secs | ts nanos |
//! | 4      | u8      | u16 + str | u16 + str   | u32 | u32 | u32   | u32     | i64     | u32      |
//! +--------+---------+-----------+-------------+-----+-----+-------+---------+---------+----------+
//! ```

use crate::error::BufferInfo;
use crate::pattern::Pattern;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const MAGIC: [u8; 4] = *b"TTHR";
const VERSION: u8 = 1;

/// Status codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("message truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown pattern tag {0}")]
    UnknownPattern(u32),

    #[error("field too long: {0} bytes")]
    FieldTooLong(usize),

    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

/// One queue-depth snapshot sent to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub id: String,
    pub host: String,
    pub inbound: u32,
    pub outbound: u32,
    pub retry: u32,
    pub pattern: Pattern,
    pub timestamp: SystemTime,
}

impl StatusMessage {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        pattern: Pattern,
        buffers: BufferInfo,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            inbound: saturate(buffers.inbound),
            outbound: saturate(buffers.outbound),
            retry: saturate(buffers.retry),
            pattern,
            timestamp: SystemTime::now(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(4 + 1 + 4 + self.id.len() + self.host.len() + 16 + 12);
        buf.extend_from_slice(&MAGIC);
        buf.push(VERSION);
        put_str(&mut buf, &self.id)?;
        put_str(&mut buf, &self.host)?;
        buf.extend_from_slice(&self.inbound.to_be_bytes());
        buf.extend_from_slice(&self.outbound.to_be_bytes());
        buf.extend_from_slice(&self.retry.to_be_bytes());
        buf.extend_from_slice(&self.pattern.tag().to_be_bytes());

        let (secs, nanos) = match self.timestamp.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                // before the epoch
                let d = e.duration();
                (-(d.as_secs() as i64), d.subsec_nanos())
            }
        };
        buf.extend_from_slice(&secs.to_be_bytes());
        buf.extend_from_slice(&nanos.to_be_bytes());
        Ok(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader { data, pos: 0 };

        let magic: [u8; 4] = reader.array()?;
        if magic != MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let version = reader.array::<1>()?[0];
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let id = reader.string()?;
        let host = reader.string()?;
        let inbound = u32::from_be_bytes(reader.array()?);
        let outbound = u32::from_be_bytes(reader.array()?);
        let retry = u32::from_be_bytes(reader.array()?);
        let tag = u32::from_be_bytes(reader.array()?);
        let pattern = Pattern::from_tag(tag).ok_or(CodecError::UnknownPattern(tag))?;
        let secs = i64::from_be_bytes(reader.array()?);
        let nanos = u32::from_be_bytes(reader.array()?);

        if reader.remaining() > 0 {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }

        let timestamp = if secs >= 0 {
            UNIX_EPOCH + Duration::new(secs as u64, nanos)
        } else {
            UNIX_EPOCH - Duration::new(secs.unsigned_abs(), nanos)
        };

        Ok(Self {
            id,
            host,
            inbound,
            outbound,
            retry,
            pattern,
            timestamp,
        })
    }

    /// Depths as a [`BufferInfo`].
    pub fn buffers(&self) -> BufferInfo {
        BufferInfo {
            inbound: self.inbound as usize,
            outbound: self.outbound as usize,
            retry: self.retry as usize,
        }
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<(), CodecError> {
    let len = u16::try_from(s.len()).map_err(|_| CodecError::FieldTooLong(s.len()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: self.pos + n,
                available: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}
