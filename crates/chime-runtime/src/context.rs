//! Per-invocation wiring: loaded config plus resolved paths.

use std::path::{Path, PathBuf};

use chime_core::GlobalConfig;
use chime_player::{CommandPlayer, SoundResolver};
use chime_scheduler::{LayeredConfig, Scheduler, SchedulerSettings, SystemClock};
use chime_state::StateStore;

use crate::config;

pub type NotifyScheduler = Scheduler<LayeredConfig, CommandPlayer, SystemClock>;

pub struct Context {
    pub config: GlobalConfig,
    pub state_path: PathBuf,
    pub verbose: bool,
    pub home: Option<PathBuf>,
    /// `$XDG_CONFIG_HOME/chime`; holds the user sound directory.
    pub config_dir: Option<PathBuf>,
}

impl Context {
    pub fn store(&self) -> StateStore {
        StateStore::new(&self.state_path).with_lock_timeout(self.config.lock_timeout())
    }

    pub fn sound_resolver(&self) -> SoundResolver {
        let user_sounds = self.config_dir.as_ref().map(|dir| dir.join("sounds"));
        SoundResolver::standard(&self.config.player.sound_dirs, user_sounds).with_home(self.home.clone())
    }

    /// Config layers for an event raised from `workspace_dir`.
    ///
    /// A broken `.chime.toml` is reported and skipped.
    pub fn source(&self, workspace_dir: Option<&Path>) -> LayeredConfig {
        let workspace = workspace_dir.and_then(|dir| match config::load_workspace(dir) {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::warn!("{e}; ignoring workspace override");
                None
            }
        });
        LayeredConfig::new(self.config.clone(), workspace, self.sound_resolver())
    }

    pub fn player(&self) -> CommandPlayer {
        let player = CommandPlayer::from_settings(self.config.player.command.as_deref(), self.config.player_timeout());
        match player.backend() {
            Some(backend) => tracing::debug!("player backend: {}", backend.program()),
            None => tracing::debug!("no player backend found on PATH"),
        }
        player
    }

    pub fn scheduler(&self, workspace_dir: Option<&Path>) -> NotifyScheduler {
        let mut settings = SchedulerSettings::from_config(&self.config);
        settings.log_denials |= self.verbose;
        Scheduler::new(
            self.store(),
            self.source(workspace_dir),
            self.player(),
            SystemClock,
            settings,
        )
    }
}

/// Tracing filter: `--verbose` wins, then `CHIME_LOG`/`RUST_LOG`, then
/// `info` if denial logging is on, else nothing.
pub fn log_filter(env_filter: Option<String>, verbose: bool, log_denials: bool) -> String {
    if verbose {
        return "debug".to_owned();
    }
    match env_filter.filter(|f| !f.trim().is_empty()) {
        Some(filter) => filter,
        None if log_denials => "info".to_owned(),
        None => "off".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_by_default() {
        assert_eq!(log_filter(None, false, false), "off");
        assert_eq!(log_filter(Some("  ".to_owned()), false, false), "off");
    }

    #[test]
    fn env_filter_used_when_set() {
        assert_eq!(log_filter(Some("chime_scheduler=debug".to_owned()), false, true), "chime_scheduler=debug");
    }

    #[test]
    fn diagnostics_and_verbose_raise_level() {
        assert_eq!(log_filter(None, false, true), "info");
        assert_eq!(log_filter(Some("warn".to_owned()), true, false), "debug");
    }

    #[test]
    fn sound_search_includes_user_dir_first_after_configured() {
        let ctx = Context {
            config: GlobalConfig::from_toml_str("[player]\nsound_dirs = [\"/opt/sounds\"]\n").expect("config"),
            state_path: PathBuf::from("/tmp/state.json"),
            verbose: false,
            home: None,
            config_dir: Some(PathBuf::from("/cfg/chime")),
        };
        let dirs = ctx.sound_resolver().dirs().to_vec();
        assert_eq!(dirs[0], PathBuf::from("/opt/sounds"));
        assert_eq!(dirs[1], PathBuf::from("/cfg/chime/sounds"));
    }
}
