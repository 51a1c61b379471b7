//! Where the scheduler gets per-kind settings from.
//!
//! Resolution runs under the state lock because the runtime profile
//! override lives in the persisted state.

use std::path::PathBuf;

use chime_core::{AdmissionPolicy, EffectiveEventConfig, EventKind, GlobalConfig, WorkspaceOverride};
use chime_player::SoundResolver;

/// Effective settings for one kind at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub config: EffectiveEventConfig,
    pub policy: AdmissionPolicy,
}

pub trait ConfigSource: Send + Sync {
    /// Settings for `kind` with `profile_override` (from state) taking
    /// precedence over the configured active profile.
    fn resolve(&self, kind: &EventKind, profile_override: Option<&str>) -> Resolution;

    /// Playable path for a sound specifier. Unresolvable specifiers come
    /// back unchanged and fail at dispatch.
    fn sound_path(&self, sound: &str) -> PathBuf;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn resolve(&self, kind: &EventKind, profile_override: Option<&str>) -> Resolution {
        (**self).resolve(kind, profile_override)
    }

    fn sound_path(&self, sound: &str) -> PathBuf {
        (**self).sound_path(sound)
    }
}

/// Global config, optional workspace override, and a sound search path.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    global: GlobalConfig,
    workspace: Option<WorkspaceOverride>,
    sounds: SoundResolver,
}

impl LayeredConfig {
    pub fn new(global: GlobalConfig, workspace: Option<WorkspaceOverride>, sounds: SoundResolver) -> Self {
        Self {
            global,
            workspace,
            sounds,
        }
    }
}

impl ConfigSource for LayeredConfig {
    fn resolve(&self, kind: &EventKind, profile_override: Option<&str>) -> Resolution {
        let selected = self.global.select_profile(profile_override);
        if let (Some(wanted), None) = (profile_override, selected) {
            tracing::debug!("profile override {wanted:?} not in config, using no profile");
        }
        let profile = selected.map(|(_, profile)| profile);
        Resolution {
            config: chime_core::resolve(&self.global, profile, self.workspace.as_ref(), kind),
            policy: self.global.admission_policy(profile),
        }
    }

    fn sound_path(&self, sound: &str) -> PathBuf {
        match self.sounds.resolve(sound) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("{e}");
                PathBuf::from(sound)
            }
        }
    }
}
