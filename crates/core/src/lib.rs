pub mod chat;
pub mod error;
pub mod format;
pub mod models;
pub mod openai;
pub mod progress;
pub mod state;
pub mod sync;
pub mod traits;
pub mod twos;
pub mod upload;

pub use chat::{CancelToken, ChatSession, PollOptions};
pub use error::{BackendError, ChatError, FetchError, SyncError};
pub use format::{format_batches, format_documents};
pub use models::{
    Batch, ChatThreadHandle, CleanupReport, ExportData, ExportPage, FormattedDocument, NoteEntry,
    NotePost, PostKind, RemoteAssistantHandle, RemoteFileHandle, RemoteIndexHandle,
    ResourceOutcome, RunStatus, SyncOptions, SyncReport, SyncStatus,
};
pub use openai::{OpenAiBackend, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL};
pub use progress::{MemoryProgress, NoProgress, Progress, StderrProgress};
pub use state::{PersistedState, StateFile, StatusCell};
pub use sync::SyncCoordinator;
pub use traits::{AssistantApi, ChatApi, FileStorage, VectorIndexApi};
pub use twos::{fetch_all, NoteSource, TwosAuth, TwosClient, DEFAULT_TWOS_BASE_URL, EXPORT_PAGE_SIZE};
pub use upload::{batch_file_name, upload_batches, upload_batches_concurrent};
