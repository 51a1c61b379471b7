use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ─── Event Kind ───────────────────────────────────────────────────

/// Lifecycle event that can trigger a notification.
///
/// The four built-in kinds cover the host hook runtime's lifecycle.
/// `Custom` is the extension point for user-defined kinds; its name is
/// restricted to `[a-z0-9_-]` so it can be used as a config table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    Stop,
    PermissionPrompt,
    IdlePrompt,
    Subagent,
    Custom(String),
}

impl EventKind {
    pub const BUILTIN: [Self; 4] = [
        Self::Stop,
        Self::PermissionPrompt,
        Self::IdlePrompt,
        Self::Subagent,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::PermissionPrompt => "permission_prompt",
            Self::IdlePrompt => "idle_prompt",
            Self::Subagent => "subagent",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "stop" | "complete" | "task_complete" => Ok(Self::Stop),
            "permission_prompt" | "permission" => Ok(Self::PermissionPrompt),
            "idle_prompt" | "idle" => Ok(Self::IdlePrompt),
            "subagent" | "subagent_stop" => Ok(Self::Subagent),
            _ => {
                let valid = !normalized.is_empty()
                    && normalized
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
                if valid {
                    Ok(Self::Custom(normalized))
                } else {
                    Err(CoreError::InvalidEventKind(s.to_owned()))
                }
            }
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl TryFrom<String> for EventKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ─── Event ────────────────────────────────────────────────────────

/// One fired lifecycle event. Created by the invocation, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub fired_at: DateTime<Utc>,
    pub source_pid: u32,
}

impl Event {
    pub fn new(kind: EventKind, fired_at: DateTime<Utc>, source_pid: u32) -> Self {
        Self {
            kind,
            fired_at,
            source_pid,
        }
    }
}

// ─── Effective Config ─────────────────────────────────────────────

/// Per-invocation view of one kind's settings after all config layers
/// are applied. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveEventConfig {
    pub kind: EventKind,
    pub enabled: bool,
    /// Sound specifier: a bare sound name or a filesystem path.
    pub sound: String,
    /// Final playback volume in `[0, 1]`.
    pub volume: f32,
    pub cooldown_secs: u64,
    pub priority: i32,
    pub rate_limit_per_minute: Option<u32>,
}

// ─── Moment ───────────────────────────────────────────────────────

/// A point in time as seen by one invocation: the absolute instant plus
/// the local wall-clock time of day used for quiet hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub at: DateTime<Utc>,
    pub time_of_day: NaiveTime,
}

impl Moment {
    pub fn new(at: DateTime<Utc>, time_of_day: NaiveTime) -> Self {
        Self { at, time_of_day }
    }

    /// Moment whose time of day is taken from UTC.
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self {
            at,
            time_of_day: at.time(),
        }
    }

    /// Moment whose time of day is the wall clock in `dt`'s zone.
    pub fn from_zoned<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            at: dt.with_timezone(&Utc),
            time_of_day: dt.naive_local().time(),
        }
    }
}
