use crate::error::SyncError;
use crate::format::format_batches;
use crate::models::{CleanupReport, ResourceOutcome, SyncOptions, SyncReport, SyncStatus};
use crate::progress::{NoProgress, Progress};
use crate::state::{PersistedState, StateFile, StatusCell};
use crate::traits::{AssistantApi, FileStorage, VectorIndexApi};
use crate::twos::{fetch_all, NoteSource};
use crate::upload::{upload_batches, upload_batches_concurrent};
use std::sync::Arc;

/// Drives one full sync: cleanup, fetch, format, upload, index, assistant.
///
/// Stages run strictly in order, each awaiting the previous. Cleanup failures
/// are collected and surfaced in the report; every other stage error aborts
/// the run and propagates unmodified.
pub struct SyncCoordinator<B> {
    backend: Arc<B>,
    state_file: StateFile,
    status: StatusCell,
    progress: Arc<dyn Progress>,
    options: SyncOptions,
}

impl<B> SyncCoordinator<B>
where
    B: FileStorage + VectorIndexApi + AssistantApi + Send + Sync + 'static,
{
    pub fn new(backend: Arc<B>, state_file: StateFile, options: SyncOptions) -> Self {
        Self {
            backend,
            state_file,
            status: StatusCell::new(),
            progress: Arc::new(NoProgress),
            options,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Sync status observed by UI surfaces; written only by this driver.
    pub fn status(&self) -> &StatusCell {
        &self.status
    }

    pub async fn sync(&self, source: &(impl NoteSource + Sync)) -> Result<SyncReport, SyncError> {
        self.status.set(SyncStatus::Syncing);

        match self.run_pipeline(source).await {
            Ok(report) => {
                self.status.set(SyncStatus::Success);
                Ok(report)
            }
            Err(error) => {
                self.status.set(SyncStatus::Error);
                Err(error)
            }
        }
    }

    /// Best-effort deletion of the previously provisioned assistant and vector
    /// store. Never fails; a persisted ID is cleared only when its deletion
    /// succeeded, so a leaked resource stays addressable on the next attempt.
    pub async fn cleanup(&self, state: &mut PersistedState) -> CleanupReport {
        let mut report = CleanupReport::default();

        if let Some(assistant) = state.assistant_id.clone() {
            self.progress.update("Deleting existing assistant...");
            match self.backend.delete_assistant(&assistant).await {
                Ok(()) => {
                    state.assistant_id = None;
                    report.assistant = ResourceOutcome::Deleted;
                }
                Err(error) => report.assistant = ResourceOutcome::Failed(error.to_string()),
            }
        }

        if let Some(index) = state.vector_store_id.clone() {
            self.progress.update("Deleting existing vector store...");
            match self.backend.delete_index(&index).await {
                Ok(()) => {
                    state.vector_store_id = None;
                    report.vector_store = ResourceOutcome::Deleted;
                }
                Err(error) => report.vector_store = ResourceOutcome::Failed(error.to_string()),
            }
        }

        report
    }

    async fn run_pipeline(&self, source: &(impl NoteSource + Sync)) -> Result<SyncReport, SyncError> {
        let mut state = self.state_file.load()?;

        self.progress.update("Starting cleanup of existing resources...");
        let cleanup = self.cleanup(&mut state).await;
        self.state_file.save(&state)?;
        self.progress.update("Cleanup completed");

        self.progress.update("Fetching data from Twos...");
        let data = fetch_all(source).await?;
        self.progress.update(&format!(
            "Data received: {} entries and {} posts",
            data.entries.len(),
            data.posts.len()
        ));

        let batches = format_batches(&data, self.options.batch_size, &self.options.entry_link_base)?;
        self.progress
            .update(&format!("Formatted data into {} batches", batches.len()));

        self.progress.update("Starting file uploads...");
        let file_ids = match self.options.upload_concurrency {
            Some(workers) if workers > 1 => {
                upload_batches_concurrent(
                    Arc::clone(&self.backend),
                    &batches,
                    Arc::clone(&self.progress),
                    workers,
                )
                .await?
            }
            _ => upload_batches(self.backend.as_ref(), &batches, self.progress.as_ref()).await?,
        };

        self.progress.update("Creating vector store...");
        let index = self
            .backend
            .create_index(&self.options.index_name)
            .await
            .map_err(SyncError::Index)?;
        state.vector_store_id = Some(index.clone());
        self.state_file.save(&state)?;
        self.progress.update("Vector store created");

        self.progress.update("Creating file batch...");
        self.backend
            .attach_files(&index, &file_ids)
            .await
            .map_err(SyncError::Index)?;
        self.progress
            .update("Files attached, indexing continues in the background");

        self.progress.update("Creating assistant...");
        let bound_index = state.vector_store_id.clone().ok_or(SyncError::NoIndex)?;
        let assistant = self
            .backend
            .create_assistant(&bound_index)
            .await
            .map_err(SyncError::Assistant)?;
        state.assistant_id = Some(assistant.clone());
        self.state_file.save(&state)?;
        self.progress.update("Assistant created");

        Ok(SyncReport {
            vector_store_id: index,
            assistant_id: assistant,
            batches_uploaded: batches.len(),
            file_ids,
            cleanup,
        })
    }
}
