//! State manager implementation
//!
//! Caller-side persistence of scan states, one per stream, in a single JSON
//! file written atomically (temp file, then rename).

use super::types::{ScanState, SyncState};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager for persisting and loading scan states
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file (empty in memory mode)
    path: PathBuf,
    /// Current states (cached)
    state: Arc<RwLock<SyncState>>,
    /// Whether to save on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_state(path.as_ref().to_path_buf(), SyncState::new(), true)
    }

    /// Create a state manager with auto-save disabled
    pub fn without_auto_save(path: impl AsRef<Path>) -> Self {
        Self::with_state(path.as_ref().to_path_buf(), SyncState::new(), false)
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(PathBuf::new(), SyncState::new(), false)
    }

    fn with_state(path: PathBuf, state: SyncState, auto_save: bool) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse(&contents)?
        } else {
            SyncState::new()
        };
        Ok(Self::with_state(path, state, true))
    }

    /// Create an in-memory state manager from an inline JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(PathBuf::new(), parse(json)?, false))
    }

    /// Reload state from the file, if it exists
    pub async fn load(&self) -> Result<()> {
        if self.is_in_memory() || !self.path.exists() {
            return Ok(());
        }
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        let loaded = parse(&contents)?;
        *self.state.write().await = loaded;
        Ok(())
    }

    /// Save current state to the file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        self.save_to_file(&self.path).await
    }

    /// Save current state to a specific file path
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;
        Ok(())
    }

    /// State of a stream, `NotStarted` if never recorded
    pub async fn get(&self, stream: &str) -> ScanState {
        self.state.read().await.get(stream)
    }

    /// Record the terminal state of a scan
    pub async fn set(&self, stream: &str, state: ScanState) -> Result<()> {
        self.state.write().await.set(stream, state);
        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Clear state for a specific stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        self.state.write().await.remove(stream);
        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        *self.state.write().await = SyncState::new();
        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Snapshot of every stream's state
    pub async fn snapshot(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

fn parse(contents: &str) -> Result<SyncState> {
    if contents.trim().is_empty() {
        return Ok(SyncState::new());
    }
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
