//! Persisted watch state — file store, atomic save, in-memory fake.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use outagewatch_common::{WatchError, WatchState};

/// Load/save boundary for the persisted state.
///
/// One pass is the only writer; invocations are serialized by the external
/// scheduler. Overlapping passes against the same state file are not
/// supported.
pub trait StateStore: Send + Sync {
    /// Load the current state. A missing file is a cold start and yields a
    /// fresh initial state; an unreadable or unparseable file is
    /// [`WatchError::StateCorrupt`] — there is no safe default for it.
    fn load(&self) -> Result<WatchState, WatchError>;

    /// Durably replace the state. Old content or new content on disk,
    /// never a partial mix.
    fn save(&self, state: &WatchState) -> Result<(), WatchError>;
}

/// JSON file store (production).
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<WatchState, WatchError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No state file yet, starting fresh");
            return Ok(WatchState::new(Utc::now()));
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| WatchError::StateCorrupt(format!("{}: {e}", self.path.display())))?;
        let state: WatchState = serde_json::from_str(&raw)
            .map_err(|e| WatchError::StateCorrupt(format!("{}: {e}", self.path.display())))?;

        info!(
            path = %self.path.display(),
            outages = state.outages.len(),
            "State file loaded"
        );
        Ok(state)
    }

    fn save(&self, state: &WatchState) -> Result<(), WatchError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state dir {}", dir.display()))?;

        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        // Write-then-rename: a kill mid-save leaves the old file intact.
        let tmp = tempfile::NamedTempFile::new_in(&dir)
            .context("Failed to create temp state file")?;
        fs::write(tmp.path(), &json).context("Failed to write temp state file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to persist state file {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            outages = state.outages.len(),
            "State file saved"
        );
        Ok(())
    }
}

/// In-memory store for tests. No filesystem required.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<WatchState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a prior state.
    pub fn seed(&self, state: WatchState) {
        *self.state.lock().unwrap() = Some(state);
    }

    /// Read the last saved state (for test assertions).
    pub fn saved(&self) -> Option<WatchState> {
        self.state.lock().unwrap().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<WatchState, WatchError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| WatchState::new(Utc::now())))
    }

    fn save(&self, state: &WatchState) -> Result<(), WatchError> {
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

/// Shared-handle blanket — lets tests keep the store for assertions.
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn load(&self) -> Result<WatchState, WatchError> {
        (**self).load()
    }

    fn save(&self, state: &WatchState) -> Result<(), WatchError> {
        (**self).save(state)
    }
}
