use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Plain,
    Checkbox,
    Photo,
    Separator,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePost {
    #[serde(rename = "_id")]
    pub id: String,
    pub entry_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: PostKind,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "photoUrls", default)]
    pub photo_urls: Vec<String>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of the Twos export endpoint. A page holding exactly
/// [`crate::twos::EXPORT_PAGE_SIZE`] entries signals that more pages may follow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportPage {
    #[serde(default)]
    pub entries: Vec<NoteEntry>,
    #[serde(default)]
    pub posts: Vec<NotePost>,
}

/// The full corpus accumulated across all export pages, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct ExportData {
    pub entries: Vec<NoteEntry>,
    pub posts: Vec<NotePost>,
}

/// A note entry rendered to markdown together with its joined posts.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedDocument {
    pub title: String,
    pub id: String,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    pub posts: Vec<NotePost>,
    pub content: String,
}

/// A fixed-size group of formatted entries serialized to one uploadable file.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub entries: Vec<FormattedDocument>,
}

/// Backend ID of one uploaded batch file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteFileHandle(pub String);

/// Backend ID of the provisioned vector store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteIndexHandle(pub String);

/// Backend ID of the provisioned assistant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteAssistantHandle(pub String);

/// Backend ID of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatThreadHandle(pub String);

impl fmt::Display for RemoteFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RemoteIndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RemoteAssistantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChatThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// Remote status of an assistant run. Unrecognized values deserialize to
/// [`RunStatus::Unknown`] and keep the poll loop going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Terminal states the run can never leave without having produced a reply.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Result of one completed sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub vector_store_id: RemoteIndexHandle,
    pub assistant_id: RemoteAssistantHandle,
    pub batches_uploaded: usize,
    pub file_ids: Vec<RemoteFileHandle>,
    pub cleanup: CleanupReport,
}

/// Outcome of one best-effort deletion during cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResourceOutcome {
    /// No previous ID was persisted, nothing to delete.
    #[default]
    NotPresent,
    Deleted,
    Failed(String),
}

/// Per-resource outcomes of the cleanup stage. Cleanup never fails the
/// pipeline; callers inspect this report instead.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub assistant: ResourceOutcome,
    pub vector_store: ResourceOutcome,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Entries per uploaded batch file.
    pub batch_size: usize,
    /// Name given to the provisioned vector store.
    pub index_name: String,
    /// Worker count for the concurrent upload path; `None` uploads sequentially.
    pub upload_concurrency: Option<usize>,
    /// Base URL used for the "View in Twos" line in rendered documents.
    pub entry_link_base: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            index_name: "Twos Chat store".to_string(),
            upload_concurrency: None,
            entry_link_base: "https://www.twosapp.com".to_string(),
        }
    }
}
