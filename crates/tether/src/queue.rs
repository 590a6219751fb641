// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded FIFO queue with a shared receive side.
//!
//! Producers clone the sender freely. The receiver sits behind an async mutex
//! so exactly one task (a dispatch loop, release, or a consumer) pulls from it
//! at a time. Depth is derived from the channel's free permits.

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, MutexGuard};

pub(crate) struct Queue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    capacity: usize,
}

impl<T> Queue<T> {
    /// `capacity` must be at least 1.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Wrap a caller-made channel. Capacity is the channel's own bound.
    pub(crate) fn from_channel(tx: mpsc::Sender<T>, rx: mpsc::Receiver<T>) -> Self {
        let capacity = tx.max_capacity();
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages currently buffered.
    pub(crate) fn len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue without waiting; hands the item back when full or closed.
    pub(crate) fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) | TrySendError::Closed(item) => item,
        })
    }

    /// Enqueue, waiting for room. Hands the item back once closed.
    pub(crate) async fn push(&self, item: T) -> Result<(), T> {
        self.tx.send(item).await.map_err(|e| e.0)
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, mpsc::Receiver<T>> {
        self.rx.lock().await
    }

    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, mpsc::Receiver<T>>> {
        self.rx.try_lock().ok()
    }
}
