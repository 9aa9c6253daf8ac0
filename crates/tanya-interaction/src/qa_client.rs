//! HTTP client for the QA backend.
//!
//! Endpoints:
//! - `POST /ask/` submits a turn and returns the reply, optionally with a
//!   newly minted chat id
//! - `GET /chat/history/{user_id}` returns the bucketed history
//! - `GET /chat/{chat_id}/messages?user_id=...` returns a full transcript
//!
//! Configuration priority: explicit constructor > `TANYA_API_URL` > default.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use tanya_core::backend::{AskRequest, BotReply, ChatBackend};
use tanya_core::chat::{ChatMessage, MessageRole};
use tanya_core::config::BackendSettings;
use tanya_core::error::{Result, TanyaError};
use tanya_core::history::{Bucket, HistoryBuckets, HistoryEntry};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the remote QA backend.
#[derive(Clone)]
pub struct QaApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct AskRequestDto<'a> {
    user_message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_id: Option<&'a str>,
    format_response: bool,
}

#[derive(Debug, Deserialize)]
struct AskResponseDto {
    response: String,
    #[serde(default)]
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponseDto {
    #[serde(default)]
    today: Vec<HistoryEntryDto>,
    #[serde(default)]
    yesterday: Vec<HistoryEntryDto>,
    #[serde(default)]
    last7days: Vec<HistoryEntryDto>,
    #[serde(default)]
    older: Vec<HistoryEntryDto>,
}

/// The backend serves history items either as a structured entry or as a
/// bare title label; both normalize to [`HistoryEntry`] before crossing into
/// the domain layer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryEntryDto {
    Entry {
        id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        message_count: Option<u32>,
    },
    Label(String),
}

impl HistoryEntryDto {
    fn into_entry(self, bucket: Bucket) -> HistoryEntry {
        match self {
            Self::Entry {
                id,
                title,
                message_count,
            } => {
                let title = title.unwrap_or_else(|| id.clone());
                HistoryEntry {
                    id,
                    title,
                    message_count,
                    bucket,
                }
            }
            Self::Label(label) => HistoryEntry {
                id: label.clone(),
                title: label,
                message_count: None,
                bucket,
            },
        }
    }
}

impl HistoryResponseDto {
    fn into_buckets(self) -> HistoryBuckets {
        fn convert(entries: Vec<HistoryEntryDto>, bucket: Bucket) -> Vec<HistoryEntry> {
            entries
                .into_iter()
                .map(|entry| entry.into_entry(bucket))
                .collect()
        }
        HistoryBuckets {
            today: convert(self.today, Bucket::Today),
            yesterday: convert(self.yesterday, Bucket::Yesterday),
            last7days: convert(self.last7days, Bucket::Last7Days),
            older: convert(self.older, Bucket::Older),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponseDto {
    #[serde(default)]
    messages: Vec<TranscriptMessageDto>,
}

#[derive(Debug, Deserialize)]
struct TranscriptMessageDto {
    role: String,
    content: String,
    #[serde(default)]
    timestamp: Option<String>,
}

impl TranscriptMessageDto {
    fn into_message(self) -> ChatMessage {
        let role = if self.role == "user" {
            MessageRole::User
        } else {
            MessageRole::Bot
        };
        ChatMessage::restored(role, self.content, display_timestamp(self.timestamp))
    }
}

/// Server timestamps arrive as RFC 3339; the transcript shows local "HH:MM".
/// Anything unparseable is passed through untouched.
fn display_timestamp(raw: Option<String>) -> String {
    match raw {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M").to_string())
            .unwrap_or(raw),
        None => String::new(),
    }
}

impl QaApiClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a client from the typed backend settings.
    pub fn from_settings(settings: &BackendSettings) -> Self {
        Self::new(&settings.base_url).with_timeout(settings.timeout())
    }

    /// Creates a client from `TANYA_API_URL`, falling back to the local
    /// default.
    pub fn try_from_env() -> Self {
        let base_url = env::var("TANYA_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn ok_or_backend_error(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TanyaError::backend(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for QaApiClient {
    async fn ask(&self, request: &AskRequest) -> Result<BotReply> {
        let url = format!("{}/ask/", self.base_url);
        let body = AskRequestDto {
            user_message: &request.user_message,
            user_id: request.user_id.as_deref(),
            chat_id: request.chat_id.as_deref(),
            format_response: true,
        };
        tracing::debug!(
            url = %url,
            user_id = ?request.user_id,
            chat_id = ?request.chat_id,
            "sending turn to backend"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = Self::ok_or_backend_error(response).await?;
        let dto: AskResponseDto = response.json().await?;
        Ok(BotReply {
            text: dto.response,
            chat_id: dto.chat_id,
        })
    }

    async fn history(&self, user_id: &str) -> Result<HistoryBuckets> {
        let url = format!("{}/chat/history/{}", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let response = Self::ok_or_backend_error(response).await?;
        let dto: HistoryResponseDto = response.json().await?;
        Ok(dto.into_buckets())
    }

    async fn transcript(&self, chat_id: &str, user_id: &str) -> Result<Vec<ChatMessage>> {
        let url = format!("{}/chat/{}/messages", self.base_url, chat_id);
        let response = self
            .client
            .get(&url)
            .query(&[("user_id", user_id)])
            .timeout(self.timeout)
            .send()
            .await?;
        let response = Self::ok_or_backend_error(response).await?;
        let dto: TranscriptResponseDto = response.json().await?;
        Ok(dto
            .messages
            .into_iter()
            .map(TranscriptMessageDto::into_message)
            .collect())
    }
}
