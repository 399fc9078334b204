use crate::error::BackendError;
use crate::models::{
    ChatThreadHandle, RemoteAssistantHandle, RemoteFileHandle, RemoteIndexHandle, RunStatus,
};
use async_trait::async_trait;

/// File-storage surface of the hosted backend.
#[async_trait]
pub trait FileStorage {
    /// Upload one serialized batch artifact; returns the backend's file ID.
    async fn upload_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFileHandle, BackendError>;
}

/// Vector-store surface of the hosted backend.
#[async_trait]
pub trait VectorIndexApi {
    async fn create_index(&self, name: &str) -> Result<RemoteIndexHandle, BackendError>;

    async fn delete_index(&self, index: &RemoteIndexHandle) -> Result<(), BackendError>;

    /// Submit a file-batch attach job. Fire-and-forget: the returned job ID is
    /// not polled, indexing may still be running when this returns.
    async fn attach_files(
        &self,
        index: &RemoteIndexHandle,
        files: &[RemoteFileHandle],
    ) -> Result<String, BackendError>;
}

/// Assistant-provisioning surface of the hosted backend.
#[async_trait]
pub trait AssistantApi {
    /// Create an assistant whose file-search tool is bound to exactly `index`.
    async fn create_assistant(
        &self,
        index: &RemoteIndexHandle,
    ) -> Result<RemoteAssistantHandle, BackendError>;

    async fn delete_assistant(&self, assistant: &RemoteAssistantHandle)
        -> Result<(), BackendError>;
}

/// Thread/run surface of the hosted backend.
#[async_trait]
pub trait ChatApi {
    /// Create a thread bound to `index`, seeded with the first user message.
    async fn create_thread(
        &self,
        index: &RemoteIndexHandle,
        first_message: &str,
    ) -> Result<ChatThreadHandle, BackendError>;

    async fn append_message(
        &self,
        thread: &ChatThreadHandle,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Trigger a run of `assistant` against the thread; returns the run ID.
    async fn start_run(
        &self,
        thread: &ChatThreadHandle,
        assistant: &RemoteAssistantHandle,
    ) -> Result<String, BackendError>;

    async fn run_status(
        &self,
        thread: &ChatThreadHandle,
        run: &str,
    ) -> Result<RunStatus, BackendError>;

    /// First text content block of the most recent thread message, if any.
    async fn latest_reply(&self, thread: &ChatThreadHandle)
        -> Result<Option<String>, BackendError>;
}
