//! Sound specifier resolution.
//!
//! A specifier is either a path (absolute, `~/`-relative, or containing a
//! separator) or a bare name such as `"glass"` looked up by file stem in
//! the search directories.

use std::path::{Path, PathBuf};

use crate::error::PlayerError;

/// Recognised audio extensions, in preference order.
pub const SOUND_EXTENSIONS: &[&str] = &["wav", "aiff", "aif", "mp3", "ogg", "oga", "flac", "m4a"];

const MACOS_SYSTEM_SOUNDS: &str = "/System/Library/Sounds";
const FREEDESKTOP_SOUNDS: &str = "/usr/share/sounds/freedesktop/stereo";

#[derive(Debug, Clone, Default)]
pub struct SoundResolver {
    dirs: Vec<PathBuf>,
    home: Option<PathBuf>,
}

impl SoundResolver {
    /// Resolver searching `dirs` in order.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs, home: None }
    }

    /// Home directory used to expand `~/`.
    #[must_use]
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Search path: configured dirs, then the user sound dir, then the
    /// platform's stock sound dirs.
    pub fn standard(configured: &[PathBuf], user_sound_dir: Option<PathBuf>) -> Self {
        let mut dirs: Vec<PathBuf> = configured.to_vec();
        dirs.extend(user_sound_dir);
        dirs.push(PathBuf::from(MACOS_SYSTEM_SOUNDS));
        dirs.push(PathBuf::from(FREEDESKTOP_SOUNDS));
        Self::new(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn resolve(&self, sound: &str) -> Result<PathBuf, PlayerError> {
        let sound = sound.trim();
        if sound.is_empty() {
            return Err(PlayerError::SoundNotFound(String::new()));
        }

        if is_path_like(sound) {
            let path = self.expand_home(sound);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(PlayerError::SoundNotFound(sound.to_owned()))
            };
        }

        self.dirs
            .iter()
            .find_map(|dir| find_by_stem(dir, sound))
            .ok_or_else(|| PlayerError::SoundNotFound(sound.to_owned()))
    }

    fn expand_home(&self, sound: &str) -> PathBuf {
        match (sound.strip_prefix("~/"), &self.home) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(sound),
        }
    }
}

fn is_path_like(sound: &str) -> bool {
    sound.starts_with('~') || sound.starts_with('.') || sound.contains('/') || sound.contains('\\')
}

/// Case-insensitive stem match with a known extension.
fn find_by_stem(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut best: Option<(usize, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        if !stem.to_string_lossy().eq_ignore_ascii_case(name) {
            continue;
        }
        let ext = ext.to_string_lossy().to_ascii_lowercase();
        let Some(rank) = SOUND_EXTENSIONS.iter().position(|known| *known == ext) else {
            continue;
        };
        if best.as_ref().is_none_or(|(best_rank, _)| rank < *best_rank) && path.is_file() {
            best = Some((rank, path));
        }
    }
    best.map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"RIFF").expect("write sound");
    }

    #[test]
    fn bare_name_found_case_insensitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("Glass.aiff"));
        let resolver = SoundResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(
            resolver.resolve("glass").expect("resolves"),
            dir.path().join("Glass.aiff")
        );
    }

    #[test]
    fn earlier_dir_wins_and_extension_preference() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        touch(&first.path().join("ping.mp3"));
        touch(&first.path().join("ping.wav"));
        touch(&second.path().join("ping.wav"));
        let resolver = SoundResolver::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(
            resolver.resolve("ping").expect("resolves"),
            first.path().join("ping.wav")
        );
    }

    #[test]
    fn unknown_extension_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("ping.txt"));
        let resolver = SoundResolver::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(resolver.resolve("ping"), Err(PlayerError::SoundNotFound(_))));
    }

    #[test]
    fn explicit_path_used_as_is() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("custom.sound");
        touch(&file);
        let resolver = SoundResolver::default();
        let sound = file.to_string_lossy().into_owned();
        assert_eq!(resolver.resolve(&sound).expect("resolves"), file);
        assert!(resolver.resolve("/definitely/not/here.wav").is_err());
    }

    #[test]
    fn tilde_expands_against_home() {
        let home = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(home.path().join("sounds")).expect("mkdir");
        touch(&home.path().join("sounds/done.wav"));
        let resolver = SoundResolver::default().with_home(Some(home.path().to_path_buf()));
        assert_eq!(
            resolver.resolve("~/sounds/done.wav").expect("resolves"),
            home.path().join("sounds/done.wav")
        );
    }

    #[test]
    fn missing_dirs_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("pop.ogg"));
        let resolver = SoundResolver::new(vec![PathBuf::from("/no/such/dir"), dir.path().to_path_buf()]);
        assert_eq!(resolver.resolve("pop").expect("resolves"), dir.path().join("pop.ogg"));
    }

    #[test]
    fn empty_specifier_rejected() {
        assert!(SoundResolver::default().resolve("  ").is_err());
    }
}
