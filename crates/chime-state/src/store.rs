//! JSON-file state store.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chime_core::PersistedState;

use crate::error::StateError;
use crate::lock::FileLock;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1_500);

/// What was found on disk.
enum Snapshot {
    Absent,
    Valid(PersistedState),
    Corrupt(String),
}

/// Shared state file plus its lock file (`<path>.lock`).
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, "lock");
        Self {
            path,
            lock_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Read the current state without locking.
    ///
    /// Absent or unreadable state yields the default. Safe to call
    /// concurrently with writers: saves are atomic renames, so a reader
    /// sees either the old or the new file.
    pub fn load(&self) -> PersistedState {
        match self.snapshot() {
            Snapshot::Absent => PersistedState::default(),
            Snapshot::Valid(state) => state,
            Snapshot::Corrupt(reason) => {
                tracing::warn!("ignoring corrupt state {}: {reason}", self.path.display());
                PersistedState::default()
            }
        }
    }

    /// Write `state` to a temp file in the same directory, fsync, rename.
    pub fn save_atomically(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut bytes = serde_json::to_vec_pretty(state)?;
        bytes.push(b'\n');

        let tmp = self.temp_path();
        let written = write_synced(&tmp, &bytes).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(StateError::Io(e));
        }
        Ok(())
    }

    /// Run `f` against the current state under the store lock and persist
    /// any change it makes.
    ///
    /// The lock is released on every exit path, including a panic in `f`
    /// (nothing is saved in that case). Waiting for the lock is bounded by
    /// the configured timeout; on expiry this returns
    /// [`StateError::LockTimeout`] without calling `f`.
    pub fn with_lock<T>(&self, f: impl FnOnce(&mut PersistedState) -> T) -> Result<T, StateError> {
        let (_guard, mut state, dirty) = self.lock_and_read()?;

        let before = state.clone();
        let out = f(&mut state);
        if dirty || state != before {
            self.save_atomically(&state)?;
        }
        Ok(out)
    }

    /// [`with_lock`](Self::with_lock) for async callers.
    ///
    /// The lock wait, read, and fsync'd save run on tokio's blocking pool;
    /// only `f` runs on the calling task. The lock is held until the save
    /// returns.
    pub async fn with_lock_async<T>(&self, f: impl FnOnce(&mut PersistedState) -> T) -> Result<T, StateError> {
        let store = self.clone();
        let (guard, mut state, dirty) = tokio::task::spawn_blocking(move || store.lock_and_read()).await??;

        let before = state.clone();
        let out = f(&mut state);
        if dirty || state != before {
            let store = self.clone();
            tokio::task::spawn_blocking(move || store.save_atomically(&state)).await??;
        }
        drop(guard);
        Ok(out)
    }

    /// Take the lock and read the state under it, quarantining a corrupt
    /// file. The returned flag is set when the state must be written back.
    fn lock_and_read(&self) -> Result<(FileLock, PersistedState, bool), StateError> {
        let guard = FileLock::acquire(&self.lock_path, self.lock_timeout)?;
        let (state, dirty) = match self.snapshot() {
            Snapshot::Absent => (PersistedState::default(), false),
            Snapshot::Valid(state) => (state, false),
            Snapshot::Corrupt(reason) => {
                tracing::warn!("resetting corrupt state {}: {reason}", self.path.display());
                self.quarantine();
                (PersistedState::default(), true)
            }
        };
        Ok((guard, state, dirty))
    }

    fn snapshot(&self) -> Snapshot {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Snapshot::Absent,
            Err(e) => return Snapshot::Corrupt(format!("read failed: {e}")),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Snapshot::Absent;
        }
        match serde_json::from_slice::<PersistedState>(&bytes) {
            Ok(mut state) => {
                state.normalize();
                Snapshot::Valid(state)
            }
            Err(e) => Snapshot::Corrupt(e.to_string()),
        }
    }

    /// Move a corrupt file aside as `<path>.corrupt`. Only called under lock.
    fn quarantine(&self) {
        let target = sibling(&self.path, "corrupt");
        if let Err(e) = fs::rename(&self.path, &target) {
            tracing::debug!("could not quarantine {}: {e}", self.path.display());
        }
    }

    fn temp_path(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        sibling(&self.path, &format!("{}-{nanos}.tmp", std::process::id()))
    }
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
