//! Admission decision: may this event play?
//!
//! Pure function of state, config, event and time. Applying the
//! consequences of a decision (cooldown stamp, token decrement) is the
//! caller's job and happens only after a dispatch attempt, so a crash
//! between decision and dispatch never consumes state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::queue::PendingPlaybackEntry;
use crate::quiet_hours::QuietHours;
use crate::state::PersistedState;
use crate::types::{EffectiveEventConfig, Event, Moment};

/// Settings that apply to every kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    pub enabled: bool,
    pub quiet_hours: Option<QuietHours>,
    pub global_rate_limit_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    Admitted,
    DeniedGlobalDisabled,
    DeniedQuickDisable,
    DeniedQuietHours,
    DeniedEventDisabled,
    DeniedCooldown(Duration),
    DeniedRateLimited,
}

impl AdmissionResult {
    pub fn is_admitted(self) -> bool {
        self == Self::Admitted
    }

    /// Stable snake_case label for logs and status output.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::DeniedGlobalDisabled => "global_disabled",
            Self::DeniedQuickDisable => "quick_disable",
            Self::DeniedQuietHours => "quiet_hours",
            Self::DeniedEventDisabled => "event_disabled",
            Self::DeniedCooldown(_) => "cooldown",
            Self::DeniedRateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for AdmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeniedCooldown(remaining) => {
                write!(f, "cooldown ({:.1}s remaining)", remaining.as_secs_f64())
            }
            other => f.write_str(other.reason()),
        }
    }
}

/// Decide whether `event` may proceed to the queue.
///
/// Checks short-circuit in this order: global enabled flag, quick-disable
/// window, quiet hours, per-event enabled flag, cooldown, rate limit.
pub fn decide(
    state: &PersistedState,
    policy: &AdmissionPolicy,
    cfg: &EffectiveEventConfig,
    event: &Event,
    now: Moment,
) -> AdmissionResult {
    debug_assert_eq!(cfg.kind, event.kind);

    if !policy.enabled {
        return AdmissionResult::DeniedGlobalDisabled;
    }
    if state.quick_disable_active(now.at) {
        return AdmissionResult::DeniedQuickDisable;
    }
    if policy
        .quiet_hours
        .is_some_and(|window| window.contains(now.time_of_day))
    {
        return AdmissionResult::DeniedQuietHours;
    }
    if !cfg.enabled {
        return AdmissionResult::DeniedEventDisabled;
    }
    throttle(
        state,
        event,
        cfg.cooldown_secs,
        cfg.rate_limit_per_minute,
        policy.global_rate_limit_per_minute,
        now.at,
    )
}

/// Re-check a popped entry just before dispatch.
///
/// Two entries of the same kind can both be admitted before either plays;
/// only the first one to reach the dispatcher may actually play. The
/// quick-disable window is honoured here too so a mute cancels what is
/// already queued.
pub fn recheck_at_dispatch(
    state: &PersistedState,
    entry: &PendingPlaybackEntry,
    global_rate_limit_per_minute: Option<u32>,
    now: DateTime<Utc>,
) -> AdmissionResult {
    if state.quick_disable_active(now) {
        return AdmissionResult::DeniedQuickDisable;
    }
    let pending = Event::new(entry.kind.clone(), entry.enqueued_at, 0);
    throttle(
        state,
        &pending,
        entry.cooldown_secs,
        entry.rate_limit_per_minute,
        global_rate_limit_per_minute,
        now,
    )
}

fn throttle(
    state: &PersistedState,
    event: &Event,
    cooldown_secs: u64,
    per_minute: Option<u32>,
    global_per_minute: Option<u32>,
    now: DateTime<Utc>,
) -> AdmissionResult {
    if let Some(remaining) = state.cooldown_remaining(&event.kind, cooldown_secs, now) {
        return AdmissionResult::DeniedCooldown(remaining);
    }
    if let Some(limit) = per_minute {
        if !state.kind_bucket(&event.kind, limit, now).has_token(now) {
            return AdmissionResult::DeniedRateLimited;
        }
    }
    if let Some(limit) = global_per_minute {
        if !state.global_bucket(limit, now).has_token(now) {
            return AdmissionResult::DeniedRateLimited;
        }
    }
    AdmissionResult::Admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::QuickDisableWindow;
    use crate::types::EventKind;
    use chrono::{NaiveTime, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
            .single()
            .expect("valid datetime")
    }

    fn at(offset_secs: i64) -> Moment {
        Moment::utc(t0() + chrono::Duration::seconds(offset_secs))
    }

    fn policy() -> AdmissionPolicy {
        AdmissionPolicy {
            enabled: true,
            quiet_hours: None,
            global_rate_limit_per_minute: None,
        }
    }

    fn cfg(kind: EventKind) -> EffectiveEventConfig {
        EffectiveEventConfig {
            kind,
            enabled: true,
            sound: "glass".to_owned(),
            volume: 0.5,
            cooldown_secs: 5,
            priority: 10,
            rate_limit_per_minute: None,
        }
    }

    fn event(kind: EventKind) -> Event {
        Event::new(kind, t0(), 1)
    }

    fn night() -> QuietHours {
        QuietHours::new("22:00".parse().expect("start"), "07:00".parse().expect("end"))
    }

    #[test]
    fn fresh_state_admits() {
        let state = PersistedState::default();
        let result = decide(&state, &policy(), &cfg(EventKind::Stop), &event(EventKind::Stop), at(0));
        assert_eq!(result, AdmissionResult::Admitted);
    }

    #[test]
    fn evaluation_order_short_circuits() {
        // Every check would deny; each disabled in turn reveals the next.
        let mut state = PersistedState::default();
        state.quick_disable = Some(QuickDisableWindow {
            until: t0() + chrono::Duration::hours(1),
            resume_profile: None,
        });
        state.record_dispatch(&EventKind::Stop, t0(), Some(1), None);

        let mut pol = AdmissionPolicy {
            enabled: false,
            quiet_hours: Some(QuietHours::new(
                "00:00".parse().expect("start"),
                "23:59".parse().expect("end"),
            )),
            global_rate_limit_per_minute: None,
        };
        let mut c = cfg(EventKind::Stop);
        c.enabled = false;
        c.rate_limit_per_minute = Some(1);
        let ev = event(EventKind::Stop);
        let now = at(1);

        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedGlobalDisabled);
        pol.enabled = true;
        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedQuickDisable);
        state.quick_disable = None;
        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedQuietHours);
        pol.quiet_hours = None;
        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedEventDisabled);
        c.enabled = true;
        assert!(matches!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedCooldown(_)));
        c.cooldown_secs = 0;
        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::DeniedRateLimited);
        c.rate_limit_per_minute = None;
        assert_eq!(decide(&state, &pol, &c, &ev, now), AdmissionResult::Admitted);
    }

    #[test]
    fn quiet_hours_use_local_time_of_day() {
        let state = PersistedState::default();
        let pol = AdmissionPolicy {
            quiet_hours: Some(night()),
            ..policy()
        };
        let c = cfg(EventKind::Stop);
        let ev = event(EventKind::Stop);
        let late = Moment::new(t0(), NaiveTime::from_hms_opt(23, 30, 0).expect("time"));
        let noon = Moment::new(t0(), NaiveTime::from_hms_opt(12, 0, 0).expect("time"));
        assert_eq!(decide(&state, &pol, &c, &ev, late), AdmissionResult::DeniedQuietHours);
        assert_eq!(decide(&state, &pol, &c, &ev, noon), AdmissionResult::Admitted);
    }

    #[test]
    fn expired_quick_disable_does_not_deny() {
        let state = PersistedState {
            quick_disable: Some(QuickDisableWindow {
                until: t0(),
                resume_profile: None,
            }),
            ..Default::default()
        };
        let result = decide(&state, &policy(), &cfg(EventKind::Stop), &event(EventKind::Stop), at(0));
        assert_eq!(result, AdmissionResult::Admitted);
    }

    #[test]
    fn cooldown_reports_remaining() {
        let mut state = PersistedState::default();
        state.record_dispatch(&EventKind::Stop, t0(), None, None);
        let result = decide(&state, &policy(), &cfg(EventKind::Stop), &event(EventKind::Stop), at(2));
        assert_eq!(result, AdmissionResult::DeniedCooldown(Duration::from_secs(3)));
        assert_eq!(result.reason(), "cooldown");
        assert_eq!(result.to_string(), "cooldown (3.0s remaining)");

        let other = decide(
            &state,
            &policy(),
            &cfg(EventKind::IdlePrompt),
            &event(EventKind::IdlePrompt),
            at(2),
        );
        assert_eq!(other, AdmissionResult::Admitted, "cooldown is per kind");
    }

    #[test]
    fn global_rate_limit_spans_kinds() {
        let mut state = PersistedState::default();
        state.record_dispatch(&EventKind::Stop, t0(), None, Some(1));
        let pol = AdmissionPolicy {
            global_rate_limit_per_minute: Some(1),
            ..policy()
        };
        let result = decide(
            &state,
            &pol,
            &cfg(EventKind::IdlePrompt),
            &event(EventKind::IdlePrompt),
            at(1),
        );
        assert_eq!(result, AdmissionResult::DeniedRateLimited);
        let later = decide(
            &state,
            &pol,
            &cfg(EventKind::IdlePrompt),
            &event(EventKind::IdlePrompt),
            at(60),
        );
        assert_eq!(later, AdmissionResult::Admitted);
    }

    #[test]
    fn rate_limit_per_kind_capacity_five() {
        let mut state = PersistedState::default();
        let mut c = cfg(EventKind::Stop);
        c.cooldown_secs = 0;
        c.rate_limit_per_minute = Some(5);
        let ev = event(EventKind::Stop);

        for _ in 0..5 {
            assert_eq!(decide(&state, &policy(), &c, &ev, at(0)), AdmissionResult::Admitted);
            state.record_dispatch(&EventKind::Stop, t0(), Some(5), None);
        }
        assert_eq!(decide(&state, &policy(), &c, &ev, at(0)), AdmissionResult::DeniedRateLimited);
        // 5/min refills one token every 12s.
        assert_eq!(decide(&state, &policy(), &c, &ev, at(11)), AdmissionResult::DeniedRateLimited);
        assert_eq!(decide(&state, &policy(), &c, &ev, at(12)), AdmissionResult::Admitted);
    }

    #[test]
    fn recheck_rejects_second_same_kind_entry() {
        let mut state = PersistedState::default();
        let entry = PendingPlaybackEntry {
            kind: EventKind::Stop,
            sound_path: "/s.wav".to_owned(),
            volume: 1.0,
            priority: 1,
            enqueued_at: t0(),
            seq: 0,
            cooldown_secs: 5,
            rate_limit_per_minute: None,
        };
        assert_eq!(recheck_at_dispatch(&state, &entry, None, t0()), AdmissionResult::Admitted);
        state.record_dispatch(&EventKind::Stop, t0(), None, None);
        assert!(matches!(
            recheck_at_dispatch(&state, &entry, None, t0() + chrono::Duration::seconds(1)),
            AdmissionResult::DeniedCooldown(_)
        ));

        state.quick_disable = Some(QuickDisableWindow {
            until: t0() + chrono::Duration::hours(1),
            resume_profile: None,
        });
        assert_eq!(
            recheck_at_dispatch(&state, &entry, None, t0() + chrono::Duration::seconds(10)),
            AdmissionResult::DeniedQuickDisable
        );
    }

    proptest! {
        /// Any schedule of attempts, dispatching whenever admitted, keeps
        /// same-kind dispatches at least `cooldown_secs` apart.
        #[test]
        fn admitted_dispatches_respect_cooldown(
            cooldown in 0u64..20,
            gaps in proptest::collection::vec(0i64..15_000, 1..40),
        ) {
            let mut state = PersistedState::default();
            let mut c = cfg(EventKind::Stop);
            c.cooldown_secs = cooldown;
            let ev = event(EventKind::Stop);
            let mut now = t0();
            let mut dispatched: Vec<DateTime<Utc>> = Vec::new();

            for gap in gaps {
                now += chrono::Duration::milliseconds(gap);
                if decide(&state, &policy(), &c, &ev, Moment::utc(now)).is_admitted() {
                    state.record_dispatch(&EventKind::Stop, now, None, None);
                    dispatched.push(now);
                }
            }
            for pair in dispatched.windows(2) {
                let gap = (pair[1] - pair[0]).num_milliseconds();
                prop_assert!(gap >= (cooldown as i64) * 1000, "gap {gap}ms < cooldown {cooldown}s");
            }
        }
    }
}
