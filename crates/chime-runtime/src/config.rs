//! Config and state file locations, and loading of the TOML layers.
//!
//! Paths are resolved from an environment lookup function so tests never
//! touch the real environment.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use chime_core::{GlobalConfig, WorkspaceOverride};
use thiserror::Error;

/// Workspace-local override file name.
pub const WORKSPACE_FILE: &str = ".chime.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ─── Paths ────────────────────────────────────────────────────────

fn non_empty(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// `$XDG_CONFIG_HOME/chime`, else `$HOME/.config/chime`.
pub fn config_dir(env: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = non_empty(env("XDG_CONFIG_HOME")) {
        return Some(xdg.join("chime"));
    }
    non_empty(env("HOME")).map(|home| home.join(".config").join("chime"))
}

/// Global config file; `explicit` already covers `$CHIME_CONFIG`.
pub fn config_path(explicit: Option<PathBuf>, env: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    explicit.or_else(|| config_dir(env).map(|dir| dir.join("config.toml")))
}

/// State file; `explicit` already covers `$CHIME_STATE`.
pub fn state_path(explicit: Option<PathBuf>, env: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Some(xdg) = non_empty(env("XDG_STATE_HOME")) {
        return xdg.join("chime").join("state.json");
    }
    match non_empty(env("HOME")) {
        Some(home) => home.join(".local/state/chime/state.json"),
        None => std::env::temp_dir().join("chime").join("state.json"),
    }
}

/// Process environment lookup for the functions above.
pub fn process_env(key: &str) -> Option<OsString> {
    std::env::var_os(key)
}

// ─── Loading ──────────────────────────────────────────────────────

/// Read `path` if it exists. `Ok(None)` when it does not.
fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Global config; a missing file (or no resolvable path) is the default.
pub fn load_global(path: Option<&Path>) -> Result<GlobalConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(GlobalConfig::default());
    };
    match read_optional(path)? {
        None => Ok(GlobalConfig::default()),
        Some(text) => GlobalConfig::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `.chime.toml` directly inside `dir`, if present.
pub fn load_workspace(dir: &Path) -> Result<Option<WorkspaceOverride>, ConfigError> {
    let path = dir.join(WORKSPACE_FILE);
    let Some(text) = read_optional(&path)? else {
        return Ok(None);
    };
    WorkspaceOverride::from_toml_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::EventKind;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_path_precedence() {
        let env = env_of(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")]);
        assert_eq!(
            config_path(Some(PathBuf::from("/explicit.toml")), &env),
            Some(PathBuf::from("/explicit.toml"))
        );
        assert_eq!(config_path(None, &env), Some(PathBuf::from("/xdg/chime/config.toml")));

        let env = env_of(&[("XDG_CONFIG_HOME", ""), ("HOME", "/home/u")]);
        assert_eq!(
            config_path(None, &env),
            Some(PathBuf::from("/home/u/.config/chime/config.toml"))
        );
        assert_eq!(config_path(None, env_of(&[])), None);
    }

    #[test]
    fn state_path_precedence() {
        let env = env_of(&[("XDG_STATE_HOME", "/xdg-state"), ("HOME", "/home/u")]);
        assert_eq!(state_path(None, &env), PathBuf::from("/xdg-state/chime/state.json"));
        let env = env_of(&[("HOME", "/home/u")]);
        assert_eq!(state_path(None, &env), PathBuf::from("/home/u/.local/state/chime/state.json"));
        assert_eq!(
            state_path(Some(PathBuf::from("/tmp/s.json")), &env),
            PathBuf::from("/tmp/s.json")
        );
    }

    #[test]
    fn missing_global_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_global(Some(&dir.path().join("absent.toml"))).expect("loads");
        assert_eq!(config, GlobalConfig::default());
        assert_eq!(load_global(None).expect("loads"), GlobalConfig::default());
    }

    #[test]
    fn malformed_global_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "enabled = maybe\n").expect("write");
        let err = load_global(Some(&path)).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn workspace_override_loaded_from_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_workspace(dir.path()).expect("loads").is_none());

        std::fs::write(dir.path().join(WORKSPACE_FILE), "[events.stop]\nsound = \"hero\"\n").expect("write");
        let workspace = load_workspace(dir.path()).expect("loads").expect("present");
        assert_eq!(
            workspace.events.get(&EventKind::Stop).and_then(|o| o.sound.as_deref()),
            Some("hero")
        );
    }
}
