//! Admit, enqueue, elect, drain.
//!
//! Every state access goes through [`StateStore::with_lock_async`], which
//! keeps the lock wait and the fsync off the async workers; the lock is
//! never held across a player call. Cooldown and rate-limit consequences
//! are applied only after a dispatch attempt returns, so a leader killed
//! between pop and stamp loses at most one cooldown stamp and never plays
//! an entry twice.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chime_core::{
    AdmissionResult, DropPolicy, EnqueueOutcome, Event, EventKind, GlobalConfig, LeaseAcquire,
    LeaseHolder, Moment, PendingPlaybackEntry, PersistedState, decide, recheck_at_dispatch,
};
use chime_player::Player;
use chime_state::{StateStore, process_alive};
use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::source::{ConfigSource, Resolution};

// ─── Settings ─────────────────────────────────────────────────────

/// Coordination knobs taken from the global config.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub max_queue: usize,
    pub drop_policy: DropPolicy,
    /// Pause after each dispatch before the next pop.
    pub spacing: Duration,
    pub lease_stale_after: Duration,
    pub global_rate_limit_per_minute: Option<u32>,
    /// Emit denials at `info` instead of `debug`.
    pub log_denials: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            max_queue: config.max_queue(),
            drop_policy: config.queue.drop_policy,
            spacing: config.spacing(),
            lease_stale_after: config.lease_stale_after(),
            global_rate_limit_per_minute: config.rate_limit.global_per_minute.filter(|n| *n > 0),
            log_denials: config.diagnostics.log_denials,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::default())
    }
}

// ─── Outcome ──────────────────────────────────────────────────────

/// Counts from one drain run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub played: usize,
    /// Dispatched but the player reported an error.
    pub failed: usize,
    /// Popped and dropped by the dispatch-time re-check.
    pub discarded: usize,
}

impl DrainReport {
    pub fn dispatched(&self) -> usize {
        self.played + self.failed
    }
}

/// What happened to one submitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Denied(AdmissionResult),
    /// The queue was full and the event was dropped. The backlog is still
    /// drained if no one else is doing it.
    Rejected { drained: Option<DrainReport> },
    /// Enqueued; another invocation holds the drain lease.
    Queued { leader_pid: u32 },
    /// Enqueued, then drained the queue as leader.
    Drained(DrainReport),
    /// State lock unavailable: decided from an unlocked read and played
    /// directly, writing nothing.
    Degraded {
        admission: AdmissionResult,
        played: bool,
    },
}

/// Whether an admission result goes to the `info` diagnostic channel.
///
/// Denials are silent by default; admitted events are reported through
/// their dispatch instead.
pub fn should_log_outcome(result: AdmissionResult, log_denials: bool) -> bool {
    log_denials && !result.is_admitted()
}

fn log_admission(kind: &EventKind, result: AdmissionResult, log_denials: bool, stage: &str) {
    if should_log_outcome(result, log_denials) {
        tracing::info!("{kind}: {stage}: {result}");
    } else {
        tracing::debug!("{kind}: {stage}: {result}");
    }
}

enum Enqueued {
    Denied(AdmissionResult),
    Offered {
        accepted: bool,
        lease: LeaseAcquire,
    },
}

enum Step {
    Dispatch(PendingPlaybackEntry),
    Empty,
    LeaseLost,
}

// ─── Scheduler ────────────────────────────────────────────────────

pub struct Scheduler<S, P, C> {
    store: StateStore,
    source: S,
    player: P,
    clock: C,
    settings: SchedulerSettings,
    holder: LeaseHolder,
    liveness: fn(u32) -> bool,
}

impl<S, P, C> Scheduler<S, P, C>
where
    S: ConfigSource,
    P: Player,
    C: Clock,
{
    pub fn new(store: StateStore, source: S, player: P, clock: C, settings: SchedulerSettings) -> Self {
        Self {
            store,
            source,
            player,
            clock,
            settings,
            holder: LeaseHolder::new(std::process::id(), fresh_token()),
            liveness: process_alive,
        }
    }

    /// Override the holder-process liveness check used for orphaned leases.
    #[must_use]
    pub fn with_liveness(mut self, alive: fn(u32) -> bool) -> Self {
        self.liveness = alive;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one event through admission and sequencing.
    ///
    /// Never fails: coordination problems degrade to a direct play.
    pub async fn submit(&self, event: &Event) -> Outcome {
        let now = self.clock.now();
        let enqueued = match self
            .store
            .with_lock_async(|state| self.enqueue(state, event, now))
            .await
        {
            Ok(enqueued) => enqueued,
            Err(e) => {
                tracing::warn!("could not coordinate ({e}); playing directly");
                return self.direct_play(event, now).await;
            }
        };

        let (accepted, lease) = match enqueued {
            Enqueued::Denied(result) => return Outcome::Denied(result),
            Enqueued::Offered { accepted, lease } => (accepted, lease),
        };

        let drained = match lease {
            LeaseAcquire::Busy { holder_pid } => {
                tracing::debug!("drain lease held by pid {holder_pid}");
                if accepted {
                    return Outcome::Queued {
                        leader_pid: holder_pid,
                    };
                }
                None
            }
            LeaseAcquire::Reclaimed { previous } => {
                tracing::info!(
                    "reclaimed drain lease from pid {} (last heartbeat {})",
                    previous.holder_pid,
                    previous.heartbeat_at
                );
                Some(self.drain().await)
            }
            LeaseAcquire::Acquired | LeaseAcquire::Renewed => Some(self.drain().await),
        };

        match (accepted, drained) {
            (true, Some(report)) => Outcome::Drained(report),
            (_, drained) => Outcome::Rejected { drained },
        }
    }

    /// Admission plus enqueue plus lease attempt, run under the lock.
    fn enqueue(&self, state: &mut PersistedState, event: &Event, now: Moment) -> Enqueued {
        if let Some(window) = state.clear_expired_quick_disable(now.at) {
            tracing::debug!("quick-disable ended at {}", window.until);
        }

        let Resolution { config, policy } = self
            .source
            .resolve(&event.kind, state.profile_override.as_deref());
        let admission = decide(state, &policy, &config, event, now);
        log_admission(&event.kind, admission, self.settings.log_denials, "admission");
        if !admission.is_admitted() {
            return Enqueued::Denied(admission);
        }

        let entry = PendingPlaybackEntry {
            kind: event.kind.clone(),
            sound_path: self.source.sound_path(&config.sound).to_string_lossy().into_owned(),
            volume: config.volume,
            priority: config.priority,
            enqueued_at: now.at,
            seq: 0,
            cooldown_secs: config.cooldown_secs,
            rate_limit_per_minute: config.rate_limit_per_minute,
        };
        let accepted = match state
            .playback_queue
            .push(entry, self.settings.max_queue, self.settings.drop_policy)
        {
            EnqueueOutcome::Enqueued { seq } => {
                tracing::debug!("{}: queued as #{seq}", event.kind);
                true
            }
            EnqueueOutcome::EnqueuedEvicting { seq, evicted } => {
                for dropped in &evicted {
                    tracing::debug!("{}: queued as #{seq}, evicted {} #{}", event.kind, dropped.kind, dropped.seq);
                }
                true
            }
            EnqueueOutcome::Rejected => {
                if self.settings.log_denials {
                    tracing::info!("{}: queue full, dropped", event.kind);
                } else {
                    tracing::debug!("{}: queue full, dropped", event.kind);
                }
                false
            }
        };

        let lease = state.try_acquire_lease(&self.holder, now.at, self.settings.lease_stale_after, self.liveness);
        Enqueued::Offered { accepted, lease }
    }

    /// Pop and dispatch until the queue is empty or the lease is lost.
    async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let now = self.clock.now().at;
            let step = self
                .store
                .with_lock_async(|state| self.next_entry(state, now, &mut report))
                .await;
            let entry = match step {
                Ok(Step::Dispatch(entry)) => entry,
                Ok(Step::Empty) => break,
                Ok(Step::LeaseLost) => {
                    tracing::warn!("drain lease taken over; stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!("drain interrupted: {e}");
                    break;
                }
            };

            if self.dispatch(&entry.kind, Path::new(&entry.sound_path), entry.volume).await {
                report.played += 1;
            } else {
                report.failed += 1;
            }

            let at = self.clock.now().at;
            let still_leader = self
                .store
                .with_lock_async(|state| {
                    state.record_dispatch(
                        &entry.kind,
                        at,
                        entry.rate_limit_per_minute,
                        self.settings.global_rate_limit_per_minute,
                    );
                    state.heartbeat(&self.holder, at)
                })
                .await;
            match still_leader {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("drain lease taken over; stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!("could not record dispatch of {}: {e}", entry.kind);
                    break;
                }
            }

            if !self.settings.spacing.is_zero() {
                tokio::time::sleep(self.settings.spacing).await;
            }
        }
        report
    }

    /// Next dispatchable entry, discarding any that fail the re-check.
    /// Releases the lease when the queue runs dry.
    fn next_entry(&self, state: &mut PersistedState, now: DateTime<Utc>, report: &mut DrainReport) -> Step {
        state.clear_expired_quick_disable(now);
        if !state.heartbeat(&self.holder, now) {
            return Step::LeaseLost;
        }
        while let Some(entry) = state.playback_queue.pop() {
            let verdict = recheck_at_dispatch(state, &entry, self.settings.global_rate_limit_per_minute, now);
            if verdict.is_admitted() {
                return Step::Dispatch(entry);
            }
            report.discarded += 1;
            log_admission(&entry.kind, verdict, self.settings.log_denials, "dropped at dispatch");
        }
        state.release_lease(&self.holder);
        Step::Empty
    }

    /// Degraded path: unlocked read, local decision, play, write nothing.
    async fn direct_play(&self, event: &Event, now: Moment) -> Outcome {
        let mut state = self.store.load();
        state.clear_expired_quick_disable(now.at);
        let Resolution { config, policy } = self
            .source
            .resolve(&event.kind, state.profile_override.as_deref());
        let admission = decide(&state, &policy, &config, event, now);
        log_admission(&event.kind, admission, self.settings.log_denials, "admission (unlocked)");
        if !admission.is_admitted() {
            return Outcome::Degraded {
                admission,
                played: false,
            };
        }
        let path = self.source.sound_path(&config.sound);
        let played = self.dispatch(&event.kind, &path, config.volume).await;
        Outcome::Degraded { admission, played }
    }

    async fn dispatch(&self, kind: &EventKind, sound: &Path, volume: f32) -> bool {
        match self.player.play(sound, volume).await {
            Ok(()) => {
                tracing::info!("{kind}: played {} at {volume:.2}", sound.display());
                true
            }
            Err(e) => {
                tracing::warn!("{kind}: playback failed: {e}");
                false
            }
        }
    }
}

/// Distinguishes drainers that share a PID.
fn fresh_token() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
