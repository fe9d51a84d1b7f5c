// SPDX-FileCopyrightText: 2026 apns-core contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Replay Queue
//!
//! Bounded, insertion-ordered record of notifications written to the
//! gateway but not yet known to have failed or scrolled out of the window.
//!
//! The gateway never acknowledges success. When it rejects a notification it
//! names only that one sequence number, and everything written after it on
//! the same connection has unknown fate. The queue reconstructs "everything
//! from X onwards" so those notifications can be resubmitted.

use std::collections::VecDeque;

/// Default number of retained in-flight notifications.
pub const DEFAULT_REPLAY_CAPACITY: usize = 10_000;

/// A queued notification with the sequence number it was sent under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight<T> {
    pub sequence: i32,
    pub item: T,
}

/// Result of [`ReplayQueue::drain_from`] on a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained<T> {
    /// The entry the gateway rejected.
    pub failed: InFlight<T>,
    /// Entries written after the failed one, in send order.
    pub resend: Vec<InFlight<T>>,
}

/// Fixed-capacity FIFO of in-flight notifications.
#[derive(Debug)]
pub struct ReplayQueue<T> {
    entries: VecDeque<InFlight<T>>,
    capacity: usize,
}

impl<T> ReplayQueue<T> {
    /// Creates an empty queue. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ReplayQueue {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn push(&mut self, sequence: i32, item: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(InFlight { sequence, item });
    }

    /// Removes the entry for `sequence` and everything pushed after it.
    ///
    /// On a hit the whole queue is cleared: entries older than the match are
    /// treated as delivered. On a miss the queue is left untouched and `None`
    /// is returned, meaning the failed entry was already evicted.
    pub fn drain_from(&mut self, sequence: i32) -> Option<Drained<T>> {
        let pos = self.entries.iter().position(|e| e.sequence == sequence)?;

        let mut tail = self.entries.split_off(pos);
        self.entries.clear();

        let failed = tail.pop_front()?;
        Some(Drained {
            failed,
            resend: tail.into(),
        })
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence numbers currently retained, oldest first.
    pub fn sequences(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.sequence).collect()
    }
}
