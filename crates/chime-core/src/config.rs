//! Configuration schema and the layered per-event resolver.
//!
//! Overlay order, later wins: built-in defaults, global `[events.<kind>]`,
//! active profile's `[profiles.<name>.events.<kind>]`, workspace-local
//! `[events.<kind>]`. Absent fields fall through to the previous layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::admission::AdmissionPolicy;
use crate::queue::DropPolicy;
use crate::quiet_hours::QuietHours;
use crate::types::{EffectiveEventConfig, EventKind};

const DEFAULT_EVENT_VOLUME: f32 = 0.7;

// ─── Event Override ───────────────────────────────────────────────

/// One layer's settings for one kind. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventOverride {
    pub enabled: Option<bool>,
    pub sound: Option<String>,
    pub volume: Option<f32>,
    pub cooldown_secs: Option<u64>,
    pub priority: Option<i32>,
    pub rate_limit_per_minute: Option<u32>,
}

impl EventOverride {
    pub fn apply_to(&self, cfg: &mut EffectiveEventConfig) {
        if let Some(enabled) = self.enabled {
            cfg.enabled = enabled;
        }
        if let Some(sound) = &self.sound {
            cfg.sound = sound.clone();
        }
        if let Some(volume) = self.volume {
            cfg.volume = volume;
        }
        if let Some(cooldown) = self.cooldown_secs {
            cfg.cooldown_secs = cooldown;
        }
        if let Some(priority) = self.priority {
            cfg.priority = priority;
        }
        if let Some(limit) = self.rate_limit_per_minute {
            // 0 means "no limit" so a later layer can lift an earlier one.
            cfg.rate_limit_per_minute = (limit > 0).then_some(limit);
        }
    }
}

// ─── Sections ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub max_len: usize,
    pub drop_policy: DropPolicy,
    /// Pause between consecutive dispatches.
    pub spacing_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_len: 8,
            drop_policy: DropPolicy::Oldest,
            spacing_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationSettings {
    /// Upper bound on waiting for the state lock before degrading.
    pub lock_timeout_ms: u64,
    /// Heartbeat age after which a drain lease may be taken over.
    pub lease_stale_secs: u64,
}

impl Default for CoordinationSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1_500,
            lease_stale_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Explicit player command; `{path}` and `{volume}` are substituted.
    pub command: Option<String>,
    pub timeout_ms: u64,
    /// Extra directories searched for bare sound names.
    pub sound_dirs: Vec<PathBuf>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: None,
            timeout_ms: 10_000,
            sound_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub global_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    /// Log every admission denial with its reason.
    pub log_denials: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub volume: Option<f32>,
    pub quiet_hours: Option<QuietHours>,
    pub events: BTreeMap<EventKind, EventOverride>,
}

/// Workspace-local override file. Only per-event blocks are honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceOverride {
    pub events: BTreeMap<EventKind, EventOverride>,
}

impl WorkspaceOverride {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

// ─── Global Config ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub enabled: bool,
    /// Master volume multiplier.
    pub volume: f32,
    pub active_profile: Option<String>,
    pub quiet_hours: Option<QuietHours>,
    pub queue: QueueSettings,
    pub coordination: CoordinationSettings,
    pub player: PlayerSettings,
    pub rate_limit: RateLimitSettings,
    pub diagnostics: DiagnosticsSettings,
    pub events: BTreeMap<EventKind, EventOverride>,
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 1.0,
            active_profile: None,
            quiet_hours: None,
            queue: QueueSettings::default(),
            coordination: CoordinationSettings::default(),
            player: PlayerSettings::default(),
            rate_limit: RateLimitSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
            events: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Pick the profile in effect: the runtime override if set, else
    /// `active_profile`. Unknown names resolve to no profile.
    pub fn select_profile<'a>(&'a self, runtime_override: Option<&'a str>) -> Option<(&'a str, &'a Profile)> {
        let name = runtime_override.or(self.active_profile.as_deref())?;
        self.profiles.get(name).map(|profile| (name, profile))
    }

    pub fn admission_policy(&self, profile: Option<&Profile>) -> AdmissionPolicy {
        AdmissionPolicy {
            enabled: self.enabled,
            quiet_hours: profile
                .and_then(|p| p.quiet_hours)
                .or(self.quiet_hours),
            global_rate_limit_per_minute: self.rate_limit.global_per_minute.filter(|n| *n > 0),
        }
    }

    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.queue.spacing_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.coordination.lock_timeout_ms)
    }

    pub fn player_timeout(&self) -> Duration {
        Duration::from_millis(self.player.timeout_ms)
    }

    /// Lease staleness, never shorter than one full dispatch cycle: the
    /// leader only heartbeats between dispatches, and each cycle may wait
    /// for the state lock twice (stamp, then pop).
    pub fn lease_stale_after(&self) -> Duration {
        let configured = Duration::from_secs(self.coordination.lease_stale_secs);
        let floor = self.player_timeout()
            + self.spacing()
            + self.lock_timeout().saturating_mul(2)
            + Duration::from_secs(5);
        configured.max(floor)
    }

    /// Queue bound, at least one slot.
    pub fn max_queue(&self) -> usize {
        self.queue.max_len.max(1)
    }
}

// ─── Resolver ─────────────────────────────────────────────────────

/// Built-in settings for a kind before any config layer applies.
pub fn builtin_defaults(kind: &EventKind) -> EffectiveEventConfig {
    let (sound, priority, cooldown_secs) = match kind {
        EventKind::PermissionPrompt => ("ping", 30, 2),
        EventKind::IdlePrompt => ("pop", 20, 30),
        EventKind::Stop => ("glass", 10, 3),
        EventKind::Subagent => ("tink", 5, 5),
        EventKind::Custom(_) => ("glass", 0, 3),
    };
    EffectiveEventConfig {
        kind: kind.clone(),
        enabled: true,
        sound: sound.to_owned(),
        volume: DEFAULT_EVENT_VOLUME,
        cooldown_secs,
        priority,
        rate_limit_per_minute: None,
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Merge all layers into the effective config for `kind`.
///
/// The returned volume is the event volume scaled by the master volume
/// and the profile volume, clamped to `[0, 1]`.
pub fn resolve(
    global: &GlobalConfig,
    profile: Option<&Profile>,
    workspace: Option<&WorkspaceOverride>,
    kind: &EventKind,
) -> EffectiveEventConfig {
    let mut cfg = builtin_defaults(kind);

    let layers = [
        global.events.get(kind),
        profile.and_then(|p| p.events.get(kind)),
        workspace.and_then(|w| w.events.get(kind)),
    ];
    for layer in layers.into_iter().flatten() {
        layer.apply_to(&mut cfg);
    }

    let profile_volume = profile.and_then(|p| p.volume).unwrap_or(1.0);
    cfg.volume = clamp_volume(clamp_volume(cfg.volume) * clamp_volume(global.volume) * clamp_volume(profile_volume));
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
enabled = true
volume = 0.5
active_profile = "work"

[quiet_hours]
start = "22:00"
end = "07:00"

[queue]
max_len = 4
drop_policy = "newest"

[rate_limit]
global_per_minute = 12

[events.stop]
sound = "hero"
cooldown_secs = 10

[events.permission_prompt]
volume = 1.0
rate_limit_per_minute = 6

[events.deploy]
sound = "/opt/sounds/deploy.wav"
priority = 50

[profiles.work]
volume = 0.5

[profiles.work.events.stop]
enabled = false

[profiles.night]
quiet_hours = { start = "20:00", end = "09:00" }
"#;

    fn sample() -> GlobalConfig {
        GlobalConfig::from_toml_str(SAMPLE).expect("sample parses")
    }

    #[test]
    fn empty_config_is_default() {
        let cfg = GlobalConfig::from_toml_str("").expect("empty parses");
        assert_eq!(cfg, GlobalConfig::default());
    }

    #[test]
    fn defaults_when_no_layers() {
        let global = GlobalConfig::default();
        let cfg = resolve(&global, None, None, &EventKind::PermissionPrompt);
        assert_eq!(cfg, builtin_defaults(&EventKind::PermissionPrompt));
        assert_eq!(cfg.priority, 30);
        assert!(cfg.enabled);
    }

    #[test]
    fn layers_apply_in_order_with_fall_through() {
        let global = sample();
        let (name, profile) = global.select_profile(None).expect("active profile");
        assert_eq!(name, "work");

        let stop = resolve(&global, Some(profile), None, &EventKind::Stop);
        assert_eq!(stop.sound, "hero", "global layer");
        assert_eq!(stop.cooldown_secs, 10, "global layer");
        assert!(!stop.enabled, "profile layer");
        assert_eq!(stop.priority, 10, "built-in falls through");

        let ws = WorkspaceOverride::from_toml_str(
            "[events.stop]\nenabled = true\nsound = \"ding\"\n",
        )
        .expect("workspace parses");
        let stop = resolve(&global, Some(profile), Some(&ws), &EventKind::Stop);
        assert!(stop.enabled, "workspace wins");
        assert_eq!(stop.sound, "ding");
        assert_eq!(stop.cooldown_secs, 10, "workspace leaves cooldown alone");
    }

    #[test]
    fn volume_scales_by_master_and_profile() {
        let global = sample();
        let profile = global.profiles.get("work");
        let perm = resolve(&global, profile, None, &EventKind::PermissionPrompt);
        assert!((perm.volume - 0.25).abs() < 1e-6, "1.0 * 0.5 * 0.5");
        assert_eq!(perm.rate_limit_per_minute, Some(6));

        let idle = resolve(&global, None, None, &EventKind::IdlePrompt);
        assert!((idle.volume - 0.35).abs() < 1e-6, "0.7 * 0.5");
    }

    #[test]
    fn volume_clamped() {
        let mut global = GlobalConfig::default();
        global.events.insert(
            EventKind::Stop,
            EventOverride {
                volume: Some(4.0),
                ..Default::default()
            },
        );
        assert!((resolve(&global, None, None, &EventKind::Stop).volume - 1.0).abs() < 1e-6);
        global.volume = f32::NAN;
        assert_eq!(resolve(&global, None, None, &EventKind::Stop).volume, 0.0);
    }

    #[test]
    fn custom_kinds_configurable() {
        let global = sample();
        let kind: EventKind = "deploy".parse().expect("kind");
        let cfg = resolve(&global, None, None, &kind);
        assert_eq!(cfg.sound, "/opt/sounds/deploy.wav");
        assert_eq!(cfg.priority, 50);
    }

    #[test]
    fn zero_rate_limit_lifts_earlier_limit() {
        let global = sample();
        let ws = WorkspaceOverride::from_toml_str(
            "[events.permission_prompt]\nrate_limit_per_minute = 0\n",
        )
        .expect("workspace parses");
        let cfg = resolve(&global, None, Some(&ws), &EventKind::PermissionPrompt);
        assert_eq!(cfg.rate_limit_per_minute, None);
    }

    #[test]
    fn profile_selection_prefers_runtime_override() {
        let global = sample();
        let (name, _) = global.select_profile(Some("night")).expect("night exists");
        assert_eq!(name, "night");
        assert!(global.select_profile(Some("missing")).is_none());
    }

    #[test]
    fn admission_policy_profile_quiet_hours_win() {
        let global = sample();
        let policy = global.admission_policy(None);
        assert!(policy.enabled);
        assert_eq!(policy.quiet_hours.map(|q| q.start.to_string()), Some("22:00".to_owned()));
        assert_eq!(policy.global_rate_limit_per_minute, Some(12));

        let night = global.profiles.get("night");
        let policy = global.admission_policy(night);
        assert_eq!(policy.quiet_hours.map(|q| q.start.to_string()), Some("20:00".to_owned()));
    }

    #[test]
    fn queue_and_lease_settings() {
        let global = sample();
        assert_eq!(global.max_queue(), 4);
        assert_eq!(global.queue.drop_policy, DropPolicy::Newest);
        assert!(global.lease_stale_after() >= global.player_timeout());

        let mut zero = GlobalConfig::default();
        zero.queue.max_len = 0;
        assert_eq!(zero.max_queue(), 1);
    }

    #[test]
    fn lease_staleness_covers_a_full_dispatch_cycle() {
        let global = GlobalConfig::from_toml_str(
            "[coordination]\nlock_timeout_ms = 20000\nlease_stale_secs = 1\n\n[player]\ntimeout_ms = 1000\n\n[queue]\nspacing_ms = 500\n",
        )
        .expect("config parses");
        let cycle = global.player_timeout() + global.spacing() + global.lock_timeout() * 2;
        assert!(global.lease_stale_after() > cycle);
        assert_eq!(global.lease_stale_after(), Duration::from_millis(46_500));
    }

    #[test]
    fn unknown_event_field_rejected() {
        let err = GlobalConfig::from_toml_str("[events.stop]\nsoud = \"typo\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn invalid_kind_key_rejected() {
        let err = GlobalConfig::from_toml_str("[events.\"bad kind\"]\nenabled = true\n");
        assert!(err.is_err());
    }
}
