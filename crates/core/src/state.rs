use crate::models::{RemoteAssistantHandle, RemoteIndexHandle, SyncStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tokio::sync::watch;

/// Credentials and resource IDs carried across runs. At most one vector store
/// and one assistant are considered current; a new sync overwrites both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twos_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twos_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store_id: Option<RemoteIndexHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<RemoteAssistantHandle>,
}

/// JSON-file backing for [`PersistedState`].
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the persisted state; a missing file yields the default state.
    pub fn load(&self) -> io::Result<PersistedState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(PersistedState::default())
            }
            Err(error) => return Err(error),
        };

        serde_json::from_str(&raw).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }

    pub fn save(&self, state: &PersistedState) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        fs::write(&self.path, raw)
    }
}

/// Single-writer, multi-reader sync status cell. The pipeline driver writes,
/// UI surfaces subscribe.
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<SyncStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncStatus::Idle);
        Self { tx }
    }

    pub fn get(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    pub fn set(&self, status: SyncStatus) {
        self.tx.send_replace(status);
    }

    /// Subscribe to status changes. The receiver observes the current value
    /// immediately and every transition after it.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
