use std::collections::HashSet;
use std::time::Duration;

use alert_core::RawMessage;
use alert_logging::{alert_debug, alert_warn};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::{FailureKind, TransportError};

/// Source of unread alert messages. Implementations are already authenticated.
#[async_trait::async_trait]
pub trait MailboxClient: Send + Sync {
    /// Ids of all unread messages, with pagination resolved.
    async fn list_unread_message_ids(&self) -> Result<Vec<String>, TransportError>;

    async fn fetch_message(&self, id: &str) -> Result<RawMessage, TransportError>;
}

#[derive(Debug, Clone)]
pub struct GmailSettings {
    pub base_url: String,
    pub user_id: String,
    pub query: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            base_url: "https://gmail.googleapis.com".to_string(),
            user_id: "me".to_string(),
            query: "is:unread".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail REST v1 client using a pre-issued OAuth access token.
#[derive(Clone)]
pub struct GmailClient {
    settings: GmailSettings,
    access_token: String,
    client: reqwest::Client,
}

impl GmailClient {
    pub fn new(
        settings: GmailSettings,
        access_token: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            access_token: access_token.into(),
            client,
        })
    }

    fn messages_url(&self, id: Option<&str>) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TransportError::new(FailureKind::InvalidUrl, "base url cannot carry a path")
            })?;
            segments
                .pop_if_empty()
                .extend(["gmail", "v1", "users", self.settings.user_id.as_str(), "messages"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, TransportError> {
        let mut attempt = 0;
        let bytes = loop {
            match self.get_once(url).await {
                Ok(bytes) => break bytes,
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    alert_warn!(
                        "GET {} failed ({}), retry {}/{}",
                        url.path(),
                        err,
                        attempt,
                        self.settings.max_retries
                    );
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::new(FailureKind::InvalidResponse, err.to_string()))
    }

    async fn get_once(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                message,
            ));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl MailboxClient for GmailClient {
    async fn list_unread_message_ids(&self) -> Result<Vec<String>, TransportError> {
        let mut ids = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.messages_url(None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("q", &self.settings.query);
                if let Some(token) = page_token.as_deref() {
                    query.append_pair("pageToken", token);
                }
            }

            let page: ListResponse = self.get_json(&url).await?;
            alert_debug!(
                "listed {} message ids (page token {:?})",
                page.messages.len(),
                page_token
            );
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(TransportError::new(
                            FailureKind::InvalidResponse,
                            format!("page token {token} repeated"),
                        ));
                    }
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn fetch_message(&self, id: &str) -> Result<RawMessage, TransportError> {
        let mut url = self.messages_url(Some(id))?;
        url.query_pairs_mut().append_pair("format", "full");
        self.get_json(&url).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}
