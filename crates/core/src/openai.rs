use crate::error::BackendError;
use crate::models::{
    ChatThreadHandle, RemoteAssistantHandle, RemoteFileHandle, RemoteIndexHandle, RunStatus,
};
use crate::traits::{AssistantApi, ChatApi, FileStorage, VectorIndexApi};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const ASSISTANT_NAME: &str = "Twos Chat";
const FILE_PURPOSE: &str = "assistants";
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

const ASSISTANT_INSTRUCTIONS: &str = "\
You are a helpful assistant that provides information based on the user's Twos data.
Use the vector store to search through their notes and provide relevant information.
When answering questions, try to:
    1. Search for relevant content in the vector store
    2. Provide specific examples from the user's notes when applicable
    3. Include relevant dates and context from the stored data
    4. Quote specific parts of notes when they directly answer the user's question
    5. ALWAYS RETURN MARKDOWN
    6. Do not add file references in the response
";

/// Client for the hosted file/vector-store/assistant/thread/run API.
pub struct OpenAiBackend {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let mut normalized = base_url.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }

        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(&normalized)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, BackendError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.endpoint(path)?)
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER, BETA_VALUE)
            .send()
            .await?;
        Self::parse(response).await.map(|_| ())
    }

    async fn parse(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }
        Ok(response.json().await?)
    }

    fn id_of(value: &Value, context: &str) -> Result<String, BackendError> {
        value
            .pointer("/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BackendError::Decode(format!("{context} response is missing an id")))
    }
}

#[async_trait]
impl FileStorage for OpenAiBackend {
    async fn upload_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFileHandle, BackendError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;
        let form = multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("files")?)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let body = Self::parse(response).await?;
        Ok(RemoteFileHandle(Self::id_of(&body, "file upload")?))
    }
}

#[async_trait]
impl VectorIndexApi for OpenAiBackend {
    async fn create_index(&self, name: &str) -> Result<RemoteIndexHandle, BackendError> {
        let body = self
            .post_json("vector_stores", &json!({ "name": name }))
            .await?;
        Ok(RemoteIndexHandle(Self::id_of(&body, "vector store")?))
    }

    async fn delete_index(&self, index: &RemoteIndexHandle) -> Result<(), BackendError> {
        self.delete(&format!("vector_stores/{}", index.0)).await
    }

    async fn attach_files(
        &self,
        index: &RemoteIndexHandle,
        files: &[RemoteFileHandle],
    ) -> Result<String, BackendError> {
        let file_ids: Vec<&str> = files.iter().map(|handle| handle.0.as_str()).collect();
        let body = self
            .post_json(
                &format!("vector_stores/{}/file_batches", index.0),
                &json!({ "file_ids": file_ids }),
            )
            .await?;
        Self::id_of(&body, "file batch")
    }
}

#[async_trait]
impl AssistantApi for OpenAiBackend {
    async fn create_assistant(
        &self,
        index: &RemoteIndexHandle,
    ) -> Result<RemoteAssistantHandle, BackendError> {
        let body = self
            .post_json(
                "assistants",
                &json!({
                    "instructions": ASSISTANT_INSTRUCTIONS,
                    "model": self.model,
                    "tools": [{ "type": "file_search" }],
                    "name": ASSISTANT_NAME,
                    "tool_resources": {
                        "file_search": {
                            "vector_store_ids": [index.0]
                        }
                    }
                }),
            )
            .await?;
        Ok(RemoteAssistantHandle(Self::id_of(&body, "assistant")?))
    }

    async fn delete_assistant(
        &self,
        assistant: &RemoteAssistantHandle,
    ) -> Result<(), BackendError> {
        self.delete(&format!("assistants/{}", assistant.0)).await
    }
}

#[async_trait]
impl ChatApi for OpenAiBackend {
    async fn create_thread(
        &self,
        index: &RemoteIndexHandle,
        first_message: &str,
    ) -> Result<ChatThreadHandle, BackendError> {
        let body = self
            .post_json(
                "threads",
                &json!({
                    "messages": [{ "role": "user", "content": first_message }],
                    "tool_resources": {
                        "file_search": {
                            "vector_store_ids": [index.0]
                        }
                    }
                }),
            )
            .await?;
        Ok(ChatThreadHandle(Self::id_of(&body, "thread")?))
    }

    async fn append_message(
        &self,
        thread: &ChatThreadHandle,
        text: &str,
    ) -> Result<(), BackendError> {
        self.post_json(
            &format!("threads/{}/messages", thread.0),
            &json!({ "role": "user", "content": text }),
        )
        .await
        .map(|_| ())
    }

    async fn start_run(
        &self,
        thread: &ChatThreadHandle,
        assistant: &RemoteAssistantHandle,
    ) -> Result<String, BackendError> {
        let body = self
            .post_json(
                &format!("threads/{}/runs", thread.0),
                &json!({ "assistant_id": assistant.0 }),
            )
            .await?;
        Self::id_of(&body, "run")
    }

    async fn run_status(
        &self,
        thread: &ChatThreadHandle,
        run: &str,
    ) -> Result<RunStatus, BackendError> {
        let body = self
            .get_json(&format!("threads/{}/runs/{run}", thread.0))
            .await?;
        let status = body
            .pointer("/status")
            .cloned()
            .ok_or_else(|| BackendError::Decode("run response is missing a status".to_string()))?;
        Ok(serde_json::from_value(status)?)
    }

    async fn latest_reply(
        &self,
        thread: &ChatThreadHandle,
    ) -> Result<Option<String>, BackendError> {
        let body = self
            .get_json(&format!("threads/{}/messages", thread.0))
            .await?;

        // Messages come back newest first; the reply is the first text block
        // of the most recent one.
        let reply = body
            .pointer("/data/0/content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks.iter().find_map(|block| {
                    if block.pointer("/type").and_then(Value::as_str) == Some("text") {
                        block
                            .pointer("/text/value")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    } else {
                        None
                    }
                })
            });

        Ok(reply)
    }
}
