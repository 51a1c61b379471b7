//! Lazily refilled token bucket.
//!
//! Refill is computed from elapsed wall-clock time on every read, so a
//! bucket persisted by one invocation can be read by a later one without
//! any background timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tolerance for float drift when comparing token counts.
const TOKEN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucket {
    /// Invariant: `0 <= tokens <= capacity`.
    pub tokens: f64,
    pub last_refill_at: DateTime<Utc>,
    pub capacity: u32,
    pub refill_per_second: f64,
}

impl TokenBucket {
    /// A bucket that starts full.
    pub fn full(capacity: u32, refill_per_second: f64, now: DateTime<Utc>) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill_at: now,
            capacity,
            refill_per_second: refill_per_second.max(0.0),
        }
    }

    /// `per_minute` tokens of burst, refilled evenly over a minute.
    pub fn per_minute(per_minute: u32, now: DateTime<Utc>) -> Self {
        Self::full(per_minute, f64::from(per_minute) / 60.0, now)
    }

    /// Whether this bucket was built from the same `per_minute` limit.
    pub fn matches_per_minute(&self, per_minute: u32) -> bool {
        self.capacity == per_minute
            && (self.refill_per_second - f64::from(per_minute) / 60.0).abs() < TOKEN_EPSILON
    }

    /// Adopt new limits, clamping the current token count to the new capacity.
    pub fn reshape(&mut self, capacity: u32, refill_per_second: f64) {
        self.capacity = capacity;
        self.refill_per_second = refill_per_second.max(0.0);
        self.tokens = self.tokens.clamp(0.0, f64::from(capacity));
    }

    /// Add tokens for the time elapsed since the last refill.
    ///
    /// A clock that moved backwards adds nothing and does not move
    /// `last_refill_at` backwards.
    pub fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_refill_at).num_milliseconds();
        if elapsed_ms <= 0 {
            return;
        }
        let added = elapsed_ms as f64 / 1000.0 * self.refill_per_second;
        self.tokens = (self.tokens + added).min(f64::from(self.capacity));
        self.last_refill_at = now;
    }

    /// Copy of this bucket refilled to `now`.
    pub fn refilled(&self, now: DateTime<Utc>) -> Self {
        let mut copy = self.clone();
        copy.refill(now);
        copy
    }

    /// Whether at least one whole token is available at `now`.
    pub fn has_token(&self, now: DateTime<Utc>) -> bool {
        self.refilled(now).tokens + TOKEN_EPSILON >= 1.0
    }

    /// Refill, then take one token even if that leaves the bucket short.
    ///
    /// Used after a dispatch has already happened: the token count floors
    /// at zero instead of going negative.
    pub fn consume(&mut self, now: DateTime<Utc>) {
        self.refill(now);
        self.tokens = (self.tokens - 1.0).max(0.0);
    }
}
