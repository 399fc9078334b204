use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("export page {page} failed with status {status}")]
    Status {
        page: u32,
        status: reqwest::StatusCode,
    },

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("invalid response from Twos: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid response from backend: {0}")]
    Decode(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch notes from Twos: {0}")]
    Fetch(#[from] FetchError),

    #[error("no entries found in Twos data")]
    EmptyData,

    #[error("upload of batch {index} failed: {source}")]
    Upload { index: usize, source: BackendError },

    #[error("{} of {total} uploads failed", failures.len())]
    UploadAggregate {
        total: usize,
        failures: Vec<(usize, BackendError)>,
    },

    #[error("vector store provisioning failed: {0}")]
    Index(BackendError),

    #[error("assistant provisioning failed: {0}")]
    Assistant(BackendError),

    #[error("no vector store is provisioned, sync data first")]
    NoIndex,

    #[error("state persistence failed: {0}")]
    State(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no assistant is provisioned, sync data first")]
    NoAssistant,

    #[error("no vector store is provisioned, sync data first")]
    NoIndex,

    #[error("assistant run ended as {status}")]
    RunFailed { status: String },

    #[error("run did not finish within {attempts} poll attempts")]
    Timeout { attempts: u32 },

    #[error("poll cancelled")]
    Cancelled,

    #[error("assistant returned no reply")]
    EmptyReply,

    #[error("regex error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
