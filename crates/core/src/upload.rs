use crate::error::{BackendError, SyncError};
use crate::models::{Batch, RemoteFileHandle};
use crate::progress::Progress;
use crate::traits::FileStorage;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Deterministic artifact name for the batch at `index`.
pub fn batch_file_name(index: usize) -> String {
    format!("twos_data_{index}.json")
}

/// Upload all batches one at a time, in order. Fails fast on the first error;
/// files already uploaded in this run are not cleaned up. Returned handles
/// match the input batch order.
pub async fn upload_batches<S>(
    storage: &S,
    batches: &[Batch],
    progress: &dyn Progress,
) -> Result<Vec<RemoteFileHandle>, SyncError>
where
    S: FileStorage + Sync + ?Sized,
{
    let total = batches.len();
    let mut handles = Vec::with_capacity(total);

    for (index, batch) in batches.iter().enumerate() {
        progress.update(&format!("Uploading file {} of {total}", index + 1));

        let bytes = serde_json::to_vec(batch).map_err(|error| SyncError::Upload {
            index,
            source: BackendError::Serialization(error),
        })?;

        let handle = storage
            .upload_document(&batch_file_name(index), bytes)
            .await
            .map_err(|source| SyncError::Upload { index, source })?;

        handles.push(handle);
    }

    Ok(handles)
}

struct UploadJob {
    index: usize,
    file_name: String,
    bytes: Vec<u8>,
}

/// Upload batches through a small pool of cooperating workers pulling from a
/// shared queue, so each batch is consumed at most once. Unlike the sequential
/// path this aggregates every failure instead of stopping at the first, and
/// successful uploads are kept either way. Handles come back in batch order.
pub async fn upload_batches_concurrent<S>(
    storage: Arc<S>,
    batches: &[Batch],
    progress: Arc<dyn Progress>,
    workers: usize,
) -> Result<Vec<RemoteFileHandle>, SyncError>
where
    S: FileStorage + Send + Sync + 'static,
{
    let total = batches.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut jobs = VecDeque::with_capacity(total);
    for (index, batch) in batches.iter().enumerate() {
        let bytes = serde_json::to_vec(batch).map_err(|error| SyncError::Upload {
            index,
            source: BackendError::Serialization(error),
        })?;
        jobs.push_back(UploadJob {
            index,
            file_name: batch_file_name(index),
            bytes,
        });
    }

    let queue = Arc::new(Mutex::new(jobs));
    let outcomes: Arc<Mutex<Vec<Option<Result<RemoteFileHandle, BackendError>>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));

    let mut pool = JoinSet::new();
    for _ in 0..workers.clamp(1, total) {
        let queue = Arc::clone(&queue);
        let outcomes = Arc::clone(&outcomes);
        let storage = Arc::clone(&storage);
        let progress = Arc::clone(&progress);

        pool.spawn(async move {
            loop {
                let job = { queue.lock().await.pop_front() };
                let Some(job) = job else { break };

                progress.update(&format!("Uploading file {} of {total}", job.index + 1));
                let result = storage.upload_document(&job.file_name, job.bytes).await;
                outcomes.lock().await[job.index] = Some(result);
            }
        });
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(join_error) = joined {
            if join_error.is_panic() {
                std::panic::resume_unwind(join_error.into_panic());
            }
        }
    }

    let outcomes = Arc::try_unwrap(outcomes)
        .map(Mutex::into_inner)
        .unwrap_or_default();

    let mut handles = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(Ok(handle)) => handles.push(handle),
            Some(Err(error)) => failures.push((index, error)),
            None => failures.push((
                index,
                BackendError::Decode("upload worker stopped before finishing".to_string()),
            )),
        }
    }

    if failures.is_empty() {
        Ok(handles)
    } else {
        Err(SyncError::UploadAggregate { total, failures })
    }
}
