//! Player binaries and how to pass them a file and a volume.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Afplay,
    Paplay,
    PwPlay,
    Ffplay,
    Aplay,
    /// User-supplied command line, split on whitespace. `{path}` and
    /// `{volume}` tokens are substituted; without `{path}` the file is
    /// appended as the last argument.
    Custom(Vec<String>),
}

impl Backend {
    /// Detection order when no command is configured.
    pub const AUTODETECT_ORDER: [Self; 5] = [
        Self::Afplay,
        Self::Paplay,
        Self::PwPlay,
        Self::Ffplay,
        Self::Aplay,
    ];

    /// Parse a configured command line. Empty input yields `None`.
    pub fn custom(command: &str) -> Option<Self> {
        let tokens: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Self::Custom(tokens))
        }
    }

    /// First built-in backend found on `path_var` (a `PATH`-style list).
    pub fn detect(path_var: Option<&OsStr>) -> Option<Self> {
        let path_var = path_var?;
        Self::AUTODETECT_ORDER
            .into_iter()
            .find(|backend| find_in_path(backend.program(), path_var).is_some())
    }

    pub fn program(&self) -> &str {
        match self {
            Self::Afplay => "afplay",
            Self::Paplay => "paplay",
            Self::PwPlay => "pw-play",
            Self::Ffplay => "ffplay",
            Self::Aplay => "aplay",
            Self::Custom(tokens) => tokens.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Arguments after the program name. `volume` is in `[0, 1]`.
    pub fn args(&self, sound: &Path, volume: f32) -> Vec<String> {
        let volume = volume.clamp(0.0, 1.0);
        let file = sound.to_string_lossy().into_owned();
        match self {
            Self::Afplay => vec!["-v".to_owned(), format!("{volume:.2}"), file],
            Self::Paplay => {
                let scaled = (f64::from(volume) * 65536.0).round() as u32;
                vec![format!("--volume={scaled}"), file]
            }
            Self::PwPlay => vec![format!("--volume={volume:.2}"), file],
            Self::Ffplay => {
                let percent = (volume * 100.0).round() as u32;
                vec![
                    "-nodisp".to_owned(),
                    "-autoexit".to_owned(),
                    "-loglevel".to_owned(),
                    "quiet".to_owned(),
                    "-volume".to_owned(),
                    percent.to_string(),
                    file,
                ]
            }
            Self::Aplay => vec!["-q".to_owned(), file],
            Self::Custom(tokens) => {
                let mut has_path = false;
                let mut args: Vec<String> = tokens
                    .iter()
                    .skip(1)
                    .map(|token| {
                        if token.contains("{path}") {
                            has_path = true;
                        }
                        token
                            .replace("{path}", &file)
                            .replace("{volume}", &format!("{volume:.2}"))
                    })
                    .collect();
                if !has_path {
                    args.push(file);
                }
                args
            }
        }
    }
}

fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
