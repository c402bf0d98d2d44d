//! REST calls against the instance API.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::error::{BotError, Result};

use super::models::{NewNote, Note};

/// Read and write access to notes on the instance.
#[async_trait]
pub trait NoteService: Send + Sync {
    /// Fetch a single note by id.
    async fn get_note(&self, id: &str) -> Result<Note>;

    /// Post a new note, returning what the instance created.
    async fn create_note(&self, note: NewNote) -> Result<Note>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteResponse {
    created_note: Note,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct MisskeyClient {
    base_url: Url,
    token: String,
    client: reqwest::Client,
}

impl MisskeyClient {
    pub fn new(base_url: Url, token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        subject: &str,
    ) -> Result<T> {
        let url = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint
        );
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
        let api_error = serde_json::from_str::<ApiErrorResponse>(&text).ok();
        let code = api_error
            .as_ref()
            .map(|e| e.error.code.clone())
            .unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => Err(BotError::NoteNotFound(subject.to_string())),
            _ if code == "NO_SUCH_NOTE" => Err(BotError::NoteNotFound(subject.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(BotError::RateLimited),
            _ if code == "RATE_LIMIT_EXCEEDED" => Err(BotError::RateLimited),
            _ => Err(BotError::InstanceApi {
                status,
                message: api_error.map_or(text, |e| e.error.message),
            }),
        }
    }
}

#[async_trait]
impl NoteService for MisskeyClient {
    async fn get_note(&self, id: &str) -> Result<Note> {
        self.post("notes/show", &json!({ "noteId": id }), id).await
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let body = serde_json::to_value(&note)?;
        let subject = note.reply_id.as_deref().unwrap_or("new note");
        let response: CreateNoteResponse = self.post("notes/create", &body, subject).await?;
        Ok(response.created_note)
    }
}
