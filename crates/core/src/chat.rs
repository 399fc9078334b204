use crate::error::ChatError;
use crate::models::{ChatThreadHandle, RemoteAssistantHandle, RemoteIndexHandle};
use crate::state::PersistedState;
use crate::traits::ChatApi;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Run-poll settings. The interval is fixed, no backoff; `max_attempts` of
/// `None` polls until the run reaches a terminal state.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: None,
        }
    }
}

/// Cooperative cancellation for a poll in flight. Clones observe the same
/// flag; cancelling wakes a sleeping poll immediately.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One conversation against the provisioned assistant.
///
/// The thread is created lazily on the first message and reused for the rest
/// of the session. Any error discards the thread handle (without deleting it
/// remotely) so the next send starts a fresh conversation.
pub struct ChatSession<B> {
    backend: Arc<B>,
    index: RemoteIndexHandle,
    assistant: RemoteAssistantHandle,
    thread: Option<ChatThreadHandle>,
    poll: PollOptions,
}

impl<B> ChatSession<B>
where
    B: ChatApi + Send + Sync,
{
    pub fn new(
        backend: Arc<B>,
        index: RemoteIndexHandle,
        assistant: RemoteAssistantHandle,
    ) -> Self {
        Self {
            backend,
            index,
            assistant,
            thread: None,
            poll: PollOptions::default(),
        }
    }

    /// Build a session from persisted sync state; fails when no vector store
    /// or assistant has been provisioned yet.
    pub fn from_state(backend: Arc<B>, state: &PersistedState) -> Result<Self, ChatError> {
        let index = state.vector_store_id.clone().ok_or(ChatError::NoIndex)?;
        let assistant = state.assistant_id.clone().ok_or(ChatError::NoAssistant)?;
        Ok(Self::new(backend, index, assistant))
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn has_thread(&self) -> bool {
        self.thread.is_some()
    }

    pub async fn send(&mut self, text: &str) -> Result<String, ChatError> {
        self.send_with_cancel(text, None).await
    }

    /// Send a message and wait for the assistant's reply, polling the run at a
    /// fixed interval. A cancel via `cancel` aborts a sleeping poll promptly.
    pub async fn send_with_cancel(
        &mut self,
        text: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<String, ChatError> {
        match self.exchange(text, cancel).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                self.thread = None;
                Err(error)
            }
        }
    }

    async fn exchange(
        &mut self,
        text: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<String, ChatError> {
        let thread = match &self.thread {
            Some(thread) => {
                self.backend.append_message(thread, text).await?;
                thread.clone()
            }
            None => {
                let thread = self.backend.create_thread(&self.index, text).await?;
                self.thread = Some(thread.clone());
                thread
            }
        };

        let run = self.backend.start_run(&thread, &self.assistant).await?;
        self.poll_run(&thread, &run, cancel).await?;

        let reply = self
            .backend
            .latest_reply(&thread)
            .await?
            .ok_or(ChatError::EmptyReply)?;
        Ok(strip_citations(&reply)?)
    }

    async fn poll_run(
        &self,
        thread: &ChatThreadHandle,
        run: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<(), ChatError> {
        let mut attempts: u32 = 0;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(ChatError::Cancelled);
                }
            }

            let status = self.backend.run_status(thread, run).await?;
            attempts += 1;

            if status.is_completed() {
                return Ok(());
            }
            if status.is_failure() {
                return Err(ChatError::RunFailed {
                    status: status.to_string(),
                });
            }
            if let Some(max) = self.poll.max_attempts {
                if attempts >= max {
                    return Err(ChatError::Timeout { attempts });
                }
            }

            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(ChatError::Cancelled),
                        _ = tokio::time::sleep(self.poll.interval) => {}
                    }
                }
                None => tokio::time::sleep(self.poll.interval).await,
            }
        }
    }
}

/// Drop the hosted assistant's `【…】` citation markers from a reply.
fn strip_citations(reply: &str) -> Result<String, regex::Error> {
    let markers = Regex::new("【[^】]*】")?;
    Ok(markers.replace_all(reply, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::models::RunStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChat {
        statuses: Mutex<Vec<RunStatus>>,
        status_checks: Mutex<u32>,
        threads_created: Mutex<u32>,
        appended: Mutex<Vec<String>>,
        reply: Option<String>,
        fail_append: bool,
    }

    impl FakeChat {
        fn with_statuses(statuses: Vec<RunStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses),
                reply: Some("hello from the assistant".to_string()),
                ..Self::default()
            }
        }

        fn status_checks(&self) -> u32 {
            *self.status_checks.lock().unwrap()
        }

        fn threads_created(&self) -> u32 {
            *self.threads_created.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn create_thread(
            &self,
            _index: &RemoteIndexHandle,
            _first_message: &str,
        ) -> Result<ChatThreadHandle, BackendError> {
            let mut created = self.threads_created.lock().unwrap();
            *created += 1;
            Ok(ChatThreadHandle(format!("thread-{created}")))
        }

        async fn append_message(
            &self,
            _thread: &ChatThreadHandle,
            text: &str,
        ) -> Result<(), BackendError> {
            if self.fail_append {
                return Err(BackendError::Api {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "append failed".to_string(),
                });
            }
            self.appended.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn start_run(
            &self,
            _thread: &ChatThreadHandle,
            _assistant: &RemoteAssistantHandle,
        ) -> Result<String, BackendError> {
            Ok("run-1".to_string())
        }

        async fn run_status(
            &self,
            _thread: &ChatThreadHandle,
            _run: &str,
        ) -> Result<RunStatus, BackendError> {
            *self.status_checks.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.is_empty() {
                Ok(RunStatus::Completed)
            } else {
                Ok(statuses.remove(0))
            }
        }

        async fn latest_reply(
            &self,
            _thread: &ChatThreadHandle,
        ) -> Result<Option<String>, BackendError> {
            Ok(self.reply.clone())
        }
    }

    fn session(backend: FakeChat) -> ChatSession<FakeChat> {
        ChatSession::new(
            Arc::new(backend),
            RemoteIndexHandle("vs_1".to_string()),
            RemoteAssistantHandle("asst_1".to_string()),
        )
        .with_poll_options(PollOptions {
            interval: Duration::from_millis(1),
            max_attempts: None,
        })
    }

    #[tokio::test]
    async fn poll_checks_until_completed() {
        let mut chat = session(FakeChat::with_statuses(vec![
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::InProgress,
            RunStatus::Completed,
        ]));

        let reply = chat.send("hi").await.expect("send should succeed");

        assert_eq!(reply, "hello from the assistant");
        assert_eq!(chat.backend.status_checks(), 4);
    }

    #[tokio::test]
    async fn failed_run_aborts_without_further_polling() {
        let mut chat = session(FakeChat::with_statuses(vec![
            RunStatus::Queued,
            RunStatus::Failed,
            RunStatus::Completed,
        ]));

        let result = chat.send("hi").await;

        assert!(matches!(result, Err(ChatError::RunFailed { .. })));
        assert_eq!(chat.backend.status_checks(), 2);
    }

    #[tokio::test]
    async fn thread_is_created_lazily_and_reused() {
        let mut chat = session(FakeChat::with_statuses(Vec::new()));

        chat.send("first").await.expect("send should succeed");
        chat.send("second").await.expect("send should succeed");

        assert_eq!(chat.backend.threads_created(), 1);
        assert_eq!(
            chat.backend.appended.lock().unwrap().clone(),
            vec!["second"]
        );
    }

    #[tokio::test]
    async fn error_resets_the_thread() {
        let backend = FakeChat {
            reply: Some("later reply".to_string()),
            fail_append: true,
            ..FakeChat::default()
        };
        let mut chat = session(backend);

        chat.send("first").await.expect("first send should succeed");
        assert!(chat.has_thread());

        let result = chat.send("second").await;
        assert!(result.is_err());
        assert!(!chat.has_thread());

        // The next send opens a fresh thread instead of reusing the old one.
        let _ = chat.send("third").await;
        assert_eq!(chat.backend.threads_created(), 2);
    }

    #[tokio::test]
    async fn bounded_poll_times_out() {
        let backend = FakeChat::with_statuses(vec![RunStatus::InProgress; 10]);
        let mut chat = ChatSession::new(
            Arc::new(backend),
            RemoteIndexHandle("vs_1".to_string()),
            RemoteAssistantHandle("asst_1".to_string()),
        )
        .with_poll_options(PollOptions {
            interval: Duration::from_millis(1),
            max_attempts: Some(3),
        });

        let result = chat.send("hi").await;

        assert!(matches!(result, Err(ChatError::Timeout { attempts: 3 })));
        assert_eq!(chat.backend.status_checks(), 3);
    }

    #[tokio::test]
    async fn cancel_aborts_a_sleeping_poll() {
        let backend = FakeChat::with_statuses(vec![RunStatus::InProgress; 1000]);
        let mut chat = ChatSession::new(
            Arc::new(backend),
            RemoteIndexHandle("vs_1".to_string()),
            RemoteAssistantHandle("asst_1".to_string()),
        )
        .with_poll_options(PollOptions {
            interval: Duration::from_secs(60),
            max_attempts: None,
        });

        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = chat.send_with_cancel("hi", Some(&token)).await;

        assert!(matches!(result, Err(ChatError::Cancelled)));
        assert!(!chat.has_thread());
    }

    #[tokio::test]
    async fn missing_state_rejects_session() {
        let state = PersistedState::default();
        let result = ChatSession::<FakeChat>::from_state(Arc::new(FakeChat::default()), &state);
        assert!(matches!(result, Err(ChatError::NoIndex)));
    }

    #[test]
    fn citation_markers_are_stripped() {
        let raw = "Your notes mention milk【4:0†twos_data_0.json】 and eggs【4:1†source】.";
        assert_eq!(
            strip_citations(raw).expect("pattern compiles"),
            "Your notes mention milk and eggs."
        );
    }
}
