//! In-memory collaborators for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::config::{BotIdentity, Config};
use crate::error::{BotError, Result};
use crate::llm::{CompletionBackend, CompletionRequest, ReplyOutput, VisionBackend};
use crate::misskey::{DriveFile, NewNote, Note, NoteService, User, Visibility};
use crate::types::{Endpoint, Provider};

pub const BOT_ID: &str = "bot-id";

pub fn user(id: &str, username: &str, host: Option<&str>) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        host: host.map(str::to_string),
        name: None,
        location: None,
    }
}

pub fn note(id: &str, text: Option<&str>, author: &User, reply_id: Option<&str>) -> Note {
    Note {
        id: id.to_string(),
        text: text.map(str::to_string),
        cw: None,
        user_id: author.id.clone(),
        user: author.clone(),
        reply_id: reply_id.map(str::to_string),
        renote_id: None,
        files: Vec::new(),
        visibility: Visibility::Public,
    }
}

pub fn image(id: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        url: format!("https://files.example/{id}.png"),
        thumbnail_url: Some(format!("https://files.example/thumb-{id}.webp")),
        content_type: "image/png".to_string(),
    }
}

pub fn endpoint(model: &str) -> Endpoint {
    Endpoint {
        url: Url::parse(&format!("https://{model}.example/v1/"))
            .unwrap_or_else(|e| panic!("bad test url: {e}")),
        key: None,
        model: model.to_string(),
        provider: Provider::OpenAi,
    }
}

pub fn identity() -> BotIdentity {
    BotIdentity {
        user_id: BOT_ID.to_string(),
        username: "bot".to_string(),
        domain: "social.example".to_string(),
    }
}

pub fn config(llm_models: &[&str], vision_models: &[&str]) -> Config {
    Config {
        instance_url: Url::parse("https://social.example/")
            .unwrap_or_else(|e| panic!("bad test url: {e}")),
        streaming_url: Url::parse("wss://social.example/")
            .unwrap_or_else(|e| panic!("bad test url: {e}")),
        token: "token".to_string(),
        identity: identity(),
        system_prompt: "Be helpful.".to_string(),
        llm_endpoints: llm_models.iter().map(|model| endpoint(model)).collect(),
        vision_endpoints: vision_models.iter().map(|model| endpoint(model)).collect(),
        max_tokens: 256,
        max_context: 1,
        max_note_length: 3000,
        max_concurrent_mentions: None,
        request_timeout: Duration::from_secs(5),
        web_search: None,
    }
}

/// Note store keyed by id; records created notes and fetches.
#[derive(Default)]
pub struct FakeNotes {
    notes: HashMap<String, Note>,
    fetched: Mutex<Vec<String>>,
    created: Mutex<Vec<NewNote>>,
}

impl FakeNotes {
    pub fn with(notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            notes: notes.into_iter().map(|note| (note.id.clone(), note)).collect(),
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn created(&self) -> Vec<NewNote> {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NoteService for FakeNotes {
    async fn get_note(&self, id: &str) -> Result<Note> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.to_string());
        self.notes
            .get(id)
            .cloned()
            .ok_or_else(|| BotError::NoteNotFound(id.to_string()))
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let created = Note {
            id: format!("created-{}", self.created().len()),
            text: Some(note.text.clone()),
            cw: None,
            user_id: BOT_ID.to_string(),
            user: user(BOT_ID, "bot", None),
            reply_id: note.reply_id.clone(),
            renote_id: None,
            files: Vec::new(),
            visibility: note.visibility,
        };
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(note);
        Ok(created)
    }
}

/// Completion backend scripted per endpoint model name.
///
/// Models starting with `fail` return an endpoint error; others answer with
/// the configured output.
pub struct FakeCompletion {
    output: ReplyOutput,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn answering(reply: &str, mentions: &[&str]) -> Self {
        Self {
            output: ReplyOutput {
                reply: reply.to_string(),
                mentions: mentions.iter().map(|m| (*m).to_string()).collect(),
            },
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &CompletionRequest,
    ) -> Result<ReplyOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(endpoint.model.clone());
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if endpoint.model.starts_with("fail") {
            return Err(BotError::EndpointApi {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream down".to_string(),
            });
        }
        Ok(self.output.clone())
    }
}

/// Vision backend that describes every image by its URL.
#[derive(Default)]
pub struct FakeVision;

#[async_trait]
impl VisionBackend for FakeVision {
    async fn describe_image(&self, _endpoint: &Endpoint, image_url: &str) -> Result<String> {
        Ok(format!("image at {image_url}"))
    }
}
