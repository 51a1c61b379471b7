//! Bounded, priority-ordered playback queue.
//!
//! Entries are kept sorted by `(priority desc, enqueued_at asc, seq asc)`.
//! `seq` is a per-queue counter that makes FIFO order strict even when two
//! invocations stamp the same `enqueued_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

use crate::types::EventKind;

// ─── Drop Policy ──────────────────────────────────────────────────

/// What to do when an entry arrives at a full queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Evict the oldest entry among the lowest priority.
    #[default]
    Oldest,
    /// Refuse the incoming entry.
    Newest,
}

// ─── Entry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPlaybackEntry {
    pub kind: EventKind,
    pub sound_path: String,
    pub volume: f32,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    /// Assigned by [`PlaybackQueue::push`].
    #[serde(default)]
    pub seq: u64,
    /// Cooldown of the enqueuing invocation's config, re-checked at pop time.
    #[serde(default)]
    pub cooldown_secs: u64,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

impl PendingPlaybackEntry {
    fn order_key(&self) -> (Reverse<i32>, DateTime<Utc>, u64) {
        (Reverse(self.priority), self.enqueued_at, self.seq)
    }

    fn dispatch_order(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// Result of offering an entry to a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Enqueued { seq: u64 },
    /// The entry was queued and others were dropped to make room.
    EnqueuedEvicting {
        seq: u64,
        evicted: Vec<PendingPlaybackEntry>,
    },
    /// The queue was full and the incoming entry was dropped.
    Rejected,
}

// ─── Queue ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackQueue {
    entries: Vec<PendingPlaybackEntry>,
    next_seq: u64,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingPlaybackEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Restore ordering after deserializing a hand-edited or foreign file.
    ///
    /// Sequence numbers are reassigned from zero when the stored counter
    /// can no longer advance past every entry.
    pub fn normalize(&mut self) {
        self.entries.sort_by(PendingPlaybackEntry::dispatch_order);
        let max_seq = self.entries.iter().map(|e| e.seq).max();
        let next = match max_seq {
            Some(max_seq) => max_seq.checked_add(1).map(|n| n.max(self.next_seq)),
            None => Some(self.next_seq),
        };
        match next {
            Some(next) if next < u64::MAX => self.next_seq = next,
            _ => self.renumber(),
        }
    }

    /// Offer an entry, applying `policy` once `len() >= max_len`.
    ///
    /// A queue already longer than `max_len` (the bound was lowered since it
    /// was written) is trimmed back to the bound by the same eviction rule.
    pub fn push(
        &mut self,
        mut entry: PendingPlaybackEntry,
        max_len: usize,
        policy: DropPolicy,
    ) -> EnqueueOutcome {
        if policy == DropPolicy::Newest {
            self.trim_to(max_len);
            if self.entries.len() >= max_len {
                return EnqueueOutcome::Rejected;
            }
        }

        entry.seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let seq = entry.seq;
        self.insert_sorted(entry);

        let evicted = self.trim_to(max_len);
        if evicted.iter().any(|e| e.seq == seq) {
            EnqueueOutcome::Rejected
        } else if evicted.is_empty() {
            EnqueueOutcome::Enqueued { seq }
        } else {
            EnqueueOutcome::EnqueuedEvicting { seq, evicted }
        }
    }

    /// Remove and return the next entry to dispatch.
    pub fn pop(&mut self) -> Option<PendingPlaybackEntry> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    fn insert_sorted(&mut self, entry: PendingPlaybackEntry) {
        let idx = self
            .entries
            .partition_point(|e| e.dispatch_order(&entry) != Ordering::Greater);
        self.entries.insert(idx, entry);
    }

    fn renumber(&mut self) {
        for (seq, entry) in (0u64..).zip(self.entries.iter_mut()) {
            entry.seq = seq;
        }
        self.next_seq = self.entries.len() as u64;
    }

    /// Drop the oldest of the lowest priority until `len() <= max_len`.
    fn trim_to(&mut self, max_len: usize) -> Vec<PendingPlaybackEntry> {
        let mut evicted = Vec::new();
        while self.entries.len() > max_len {
            match self.evict_lowest_oldest() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    fn evict_lowest_oldest(&mut self) -> Option<PendingPlaybackEntry> {
        let lowest = self.entries.iter().map(|e| e.priority).min()?;
        // Sorted order puts the lowest priority group last, oldest first within it.
        let idx = self.entries.iter().position(|e| e.priority == lowest)?;
        Some(self.entries.remove(idx))
    }
}
