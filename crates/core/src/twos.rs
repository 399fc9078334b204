use crate::error::FetchError;
use crate::models::{ExportData, ExportPage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Export page-size sentinel: a page holding exactly this many entries means
/// more pages may exist and the next one is requested.
pub const EXPORT_PAGE_SIZE: usize = 500;

pub const DEFAULT_TWOS_BASE_URL: &str = "https://www.twosapp.com";

/// A paginated source of note entries and posts.
#[async_trait]
pub trait NoteSource {
    async fn fetch_page(&self, page: u32) -> Result<ExportPage, FetchError>;
}

/// Credentials returned by the Twos login endpoint.
#[derive(Debug, Clone)]
pub struct TwosAuth {
    pub user_id: String,
    pub token: String,
}

/// Client for the Twos export API.
pub struct TwosClient {
    client: Client,
    base_url: String,
    user_id: String,
    token: String,
}

impl TwosClient {
    pub fn new(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base(base_url.into()),
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    /// Exchange a username/password for the user ID and API token the export
    /// endpoint expects.
    pub async fn login(
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<TwosAuth, FetchError> {
        let url = format!("{}/apiV2/user/login/new", trim_base(base_url.to_string()));
        let response = Client::new()
            .post(url)
            .json(&json!({
                "user": {
                    "username": username,
                    "password": password,
                }
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/message")
                .and_then(Value::as_str)
                .unwrap_or("login failed")
                .to_string();
            return Err(FetchError::LoginRejected(message));
        }

        let user_id = body.pointer("/user/_id").and_then(Value::as_str);
        let token = body.pointer("/user/token").and_then(Value::as_str);

        match (user_id, token) {
            (Some(user_id), Some(token)) => Ok(TwosAuth {
                user_id: user_id.to_string(),
                token: token.to_string(),
            }),
            _ => Err(FetchError::Decode(
                "login response is missing user id or token".to_string(),
            )),
        }
    }
}

#[async_trait]
impl NoteSource for TwosClient {
    async fn fetch_page(&self, page: u32) -> Result<ExportPage, FetchError> {
        let response = self
            .client
            .post(format!("{}/apiV2/user/export", self.base_url))
            .json(&json!({
                "user_id": self.user_id,
                "token": self.token,
                "page": page,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                page,
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }
}

/// Fetch the full note corpus, paginating from page 0 until a short page is
/// returned. Any page failure fails the whole call; data already accumulated
/// is discarded.
pub async fn fetch_all(source: &(impl NoteSource + Sync + ?Sized)) -> Result<ExportData, FetchError> {
    let mut data = ExportData::default();
    let mut page = 0u32;

    loop {
        let fetched = source.fetch_page(page).await?;
        let entry_count = fetched.entries.len();

        data.entries.extend(fetched.entries);
        data.posts.extend(fetched.posts);

        if entry_count < EXPORT_PAGE_SIZE {
            break;
        }
        page += 1;
    }

    Ok(data)
}

fn trim_base(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteEntry, NotePost, PostKind};
    use std::sync::Mutex;

    struct FakeSource {
        pages: Vec<ExportPage>,
        requested: Mutex<Vec<u32>>,
    }

    impl FakeSource {
        fn new(pages: Vec<ExportPage>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NoteSource for FakeSource {
        async fn fetch_page(&self, page: u32) -> Result<ExportPage, FetchError> {
            self.requested.lock().unwrap().push(page);
            self.pages
                .get(page as usize)
                .cloned()
                .ok_or(FetchError::Status {
                    page,
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                })
        }
    }

    fn entries(prefix: &str, count: usize) -> Vec<NoteEntry> {
        (0..count)
            .map(|n| NoteEntry {
                id: format!("{prefix}-{n}"),
                title: format!("Entry {n}"),
                last_modified: None,
            })
            .collect()
    }

    fn posts(prefix: &str, count: usize) -> Vec<NotePost> {
        (0..count)
            .map(|n| NotePost {
                id: format!("{prefix}-post-{n}"),
                entry_id: format!("{prefix}-{n}"),
                text: format!("post {n}"),
                kind: PostKind::Plain,
                completed: None,
                url: None,
                tags: Vec::new(),
                photo_urls: Vec::new(),
                last_modified: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn pagination_stops_after_short_page() {
        let source = FakeSource::new(vec![
            ExportPage {
                entries: entries("a", EXPORT_PAGE_SIZE),
                posts: posts("a", 3),
            },
            ExportPage {
                entries: entries("b", EXPORT_PAGE_SIZE),
                posts: posts("b", 2),
            },
            ExportPage {
                entries: entries("c", 137),
                posts: posts("c", 1),
            },
        ]);

        let data = fetch_all(&source).await.expect("fetch should succeed");

        assert_eq!(source.requested(), vec![0, 1, 2]);
        assert_eq!(data.entries.len(), EXPORT_PAGE_SIZE * 2 + 137);
        assert_eq!(data.posts.len(), 6);
        // Accumulation preserves page order.
        assert_eq!(data.entries[0].id, "a-0");
        assert_eq!(data.entries[EXPORT_PAGE_SIZE].id, "b-0");
        assert_eq!(data.entries[EXPORT_PAGE_SIZE * 2].id, "c-0");
    }

    #[tokio::test]
    async fn short_first_page_means_single_request() {
        let source = FakeSource::new(vec![ExportPage {
            entries: entries("a", 12),
            posts: Vec::new(),
        }]);

        let data = fetch_all(&source).await.expect("fetch should succeed");

        assert_eq!(source.requested(), vec![0]);
        assert_eq!(data.entries.len(), 12);
    }

    #[tokio::test]
    async fn failing_page_fails_the_whole_fetch() {
        // Page 1 does not exist in the fake, so the second request errors.
        let source = FakeSource::new(vec![ExportPage {
            entries: entries("a", EXPORT_PAGE_SIZE),
            posts: Vec::new(),
        }]);

        let result = fetch_all(&source).await;

        assert!(matches!(result, Err(FetchError::Status { page: 1, .. })));
        assert_eq!(source.requested(), vec![0, 1]);
    }

    #[tokio::test]
    async fn failing_first_page_returns_no_data() {
        let source = FakeSource::new(Vec::new());

        let result = fetch_all(&source).await;

        assert!(matches!(result, Err(FetchError::Status { page: 0, .. })));
    }
}
