//! `Player` trait and the subprocess implementation.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Backend;
use crate::error::PlayerError;

/// Plays one sound file to completion. Mock-injectable for tests.
///
/// Implementations block (asynchronously) until playback finishes or
/// fails; retry policy, if any, belongs to the implementation.
pub trait Player: Send + Sync {
    fn play(&self, sound: &Path, volume: f32) -> impl Future<Output = Result<(), PlayerError>> + Send;
}

impl<T: Player + ?Sized> Player for &T {
    fn play(&self, sound: &Path, volume: f32) -> impl Future<Output = Result<(), PlayerError>> + Send {
        (**self).play(sound, volume)
    }
}

impl<T: Player + ?Sized> Player for Arc<T> {
    fn play(&self, sound: &Path, volume: f32) -> impl Future<Output = Result<(), PlayerError>> + Send {
        (**self).play(sound, volume)
    }
}

/// Runs an external player binary; the child is killed on timeout.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    backend: Option<Backend>,
    timeout: Duration,
}

impl CommandPlayer {
    pub fn new(backend: Option<Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Explicit command if given, otherwise the first backend on `$PATH`.
    pub fn from_settings(command: Option<&str>, timeout: Duration) -> Self {
        let backend = match command.and_then(Backend::custom) {
            Some(custom) => Some(custom),
            None => Backend::detect(std::env::var_os("PATH").as_deref()),
        };
        Self::new(backend, timeout)
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }
}

impl Player for CommandPlayer {
    async fn play(&self, sound: &Path, volume: f32) -> Result<(), PlayerError> {
        let backend = self.backend.as_ref().ok_or(PlayerError::NoBackend)?;
        if !sound.is_file() {
            return Err(PlayerError::SoundNotFound(sound.display().to_string()));
        }

        let program = backend.program().to_owned();
        let args = backend.args(sound, volume);
        tracing::debug!("running {program} {}", args.join(" "));

        let child = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(PlayerError::Exited {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            }),
            Ok(Err(e)) => Err(PlayerError::Io(e)),
            Err(_) => Err(PlayerError::Timeout {
                program,
                timeout: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    fn sound_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("ding.wav");
        std::fs::write(&path, b"RIFF").expect("write sound");
        path
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn no_backend_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let player = CommandPlayer::new(None, Duration::from_secs(1));
        let err = player.play(&sound_file(&dir), 1.0).await.expect_err("no backend");
        assert!(matches!(err, PlayerError::NoBackend));
    }

    #[tokio::test]
    async fn missing_sound_is_an_error() {
        let player = CommandPlayer::new(Backend::custom("true"), Duration::from_secs(1));
        let err = player
            .play(Path::new("/no/such/sound.wav"), 1.0)
            .await
            .expect_err("missing file");
        assert!(matches!(err, PlayerError::SoundNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_player_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cmd = script(&dir, "ok.sh", "exit 0");
        let player = CommandPlayer::new(Backend::custom(&cmd), Duration::from_secs(5));
        player.play(&sound_file(&dir), 0.5).await.expect("plays");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_player_reports_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cmd = script(&dir, "fail.sh", "echo 'device busy' >&2\nexit 3");
        let player = CommandPlayer::new(Backend::custom(&cmd), Duration::from_secs(5));
        let err = player.play(&sound_file(&dir), 0.5).await.expect_err("fails");
        match err {
            PlayerError::Exited { stderr, .. } => assert_eq!(stderr, "device busy"),
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_player_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cmd = script(&dir, "hang.sh", "exec sleep 30");
        let player = CommandPlayer::new(Backend::custom(&cmd), Duration::from_millis(200));
        let start = Instant::now();
        let err = player.play(&sound_file(&dir), 0.5).await.expect_err("times out");
        assert!(matches!(err, PlayerError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5), "timeout is enforced");
    }

    #[tokio::test]
    async fn unspawnable_program_is_spawn_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let player = CommandPlayer::new(
            Backend::custom("/no/such/player-binary"),
            Duration::from_secs(1),
        );
        let err = player.play(&sound_file(&dir), 0.5).await.expect_err("spawn fails");
        assert!(matches!(err, PlayerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn blanket_ref_impl() {
        struct Silent;
        impl Player for Silent {
            async fn play(&self, _sound: &Path, _volume: f32) -> Result<(), PlayerError> {
                Ok(())
            }
        }
        let silent = Silent;
        let by_ref: &Silent = &silent;
        by_ref.play(Path::new("/x.wav"), 1.0).await.expect("ok");
        Arc::new(Silent).play(Path::new("/x.wav"), 1.0).await.expect("ok");
    }
}
