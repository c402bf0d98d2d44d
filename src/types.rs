//! Common types used throughout the relay bot.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::misskey::DriveFile;

/// Role of a message in the conversation.
///
/// Maps to chat completion API message roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from a human on the instance
    User,
    /// Message previously posted by the bot
    Assistant,
    /// System prompt or instructions
    System,
    /// Result from a tool execution
    Tool,
}

/// API dialect spoken by an endpoint.
///
/// Every supported provider exposes an OpenAI-compatible chat completions route.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    #[default]
    OpenAi,
    OpenRouter,
    Ollama,
}

/// Which endpoint list a request is dispatched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EndpointKind {
    Completion,
    Vision,
}

/// A configured model backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    /// Base URL, e.g. `https://api.openai.com/v1/`
    pub url: Url,
    #[serde(default)]
    pub key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub provider: Provider,
}

impl Endpoint {
    /// Chat completions URL for this endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.url.as_str().trim_end_matches('/')
        )
    }
}

/// One turn of the conversation handed to the completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub note_id: String,
    pub role: MessageRole,
    /// Handle of the note's author, e.g. `@alice@remote.example`
    pub author: String,
    pub text: String,
    pub files: Vec<DriveFile>,
    pub image_descriptions: Vec<String>,
}

impl ContextEntry {
    /// Text as shown to the model, with image descriptions inlined.
    pub fn render(&self) -> String {
        let mut rendered = match self.role {
            MessageRole::User => format!("{}: {}", self.author, self.text),
            _ => self.text.clone(),
        };
        for description in &self.image_descriptions {
            rendered.push_str("\n[Image: ");
            rendered.push_str(description);
            rendered.push(']');
        }
        rendered
    }
}
