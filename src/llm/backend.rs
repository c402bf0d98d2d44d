//! Backend traits and the structured reply contract.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{BotError, Result};
use crate::types::{ContextEntry, Endpoint};

/// What the model wants to post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyOutput {
    pub reply: String,
    /// Usernames the model intends to address
    pub mentions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawReplyOutput {
    reply: Option<String>,
    #[serde(default)]
    mentions: Option<Vec<String>>,
}

impl ReplyOutput {
    /// Validates raw model text against the reply schema.
    ///
    /// Accepts a bare JSON object or one wrapped in a Markdown code fence.
    pub fn parse(raw: &str) -> Result<Self> {
        let json = extract_json_object(raw)
            .ok_or_else(|| BotError::Schema("no JSON object in model output".to_string()))?;
        let parsed: RawReplyOutput = serde_json::from_str(json)
            .map_err(|e| BotError::Schema(format!("invalid reply object: {e}")))?;

        let reply = parsed
            .reply
            .map(|reply| reply.trim().to_string())
            .filter(|reply| !reply.is_empty())
            .ok_or_else(|| BotError::Schema("`reply` is missing or empty".to_string()))?;

        Ok(Self {
            reply,
            mentions: parsed.mentions.unwrap_or_default(),
        })
    }
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Everything a completion endpoint needs to answer one mention.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Facts about the current conversation (time, author, location)
    pub dynamic_context: String,
    /// Conversation transcript, oldest first
    pub context: Vec<ContextEntry>,
}

/// Produces a structured reply from one endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, endpoint: &Endpoint, request: &CompletionRequest)
    -> Result<ReplyOutput>;
}

/// Describes images using one endpoint.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn describe_image(&self, endpoint: &Endpoint, image_url: &str) -> Result<String>;
}
