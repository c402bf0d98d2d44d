use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};
use crate::tools::ToolSet;
use crate::types::{Endpoint, MessageRole, Provider};

use super::backend::{CompletionBackend, CompletionRequest, ReplyOutput, VisionBackend};
use super::tool_loop::run_tool_loop;

const TEMPERATURE: f32 = 0.7;

// Image descriptions only need a sentence or two
const VISION_MAX_TOKENS: u32 = 300;

const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in one or two sentences. \
    Mention any visible text verbatim.";

const REPLY_FORMAT_INSTRUCTIONS: &str = "Answer with a single JSON object and nothing else: \
    {\"reply\": \"<your reply>\", \"mentions\": [\"<username>\", ...]}. \
    `reply` must not be empty and must NOT include mentions or usernames. \
    `mentions` lists the users mentioned in the message that should be addressed.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

// Tool calling structures
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Result of a chat completion
pub enum ChatResult {
    /// Model produced a text response
    TextResponse(String),
    /// Model wants to call tools
    ToolCalls {
        tool_calls: Vec<ToolCall>,
        assistant_message: Message,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    MultiPart(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn text(role: MessageRole, text: String) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text)),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    max_tokens: u32,
    tools: ToolSet,
}

impl OpenAiBackend {
    /// Every request is abandoned after `timeout` so a hung endpoint fails over.
    pub fn new(max_tokens: u32, tools: ToolSet, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_tokens,
            tools,
        })
    }

    pub(super) fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub(super) fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub(super) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(super) async fn chat(
        &self,
        endpoint: &Endpoint,
        messages: Vec<Message>,
        max_tokens: u32,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResult> {
        debug!(
            "Sending request to {} ({}) with {} messages",
            endpoint.model,
            endpoint.provider,
            messages.len()
        );

        let request = ChatRequest {
            model: endpoint.model.clone(),
            messages,
            max_tokens,
            temperature: TEMPERATURE,
            tools,
        };

        let mut builder = self
            .client
            .post(endpoint.chat_completions_url())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &endpoint.key {
            builder = builder.bearer_auth(key);
        }
        if endpoint.provider == Provider::OpenRouter {
            builder = builder.header("X-Title", env!("CARGO_PKG_NAME"));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::EndpointApi { status, message });
        }

        let api_response: ChatResponse = response.json().await?;

        let message = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BotError::EndpointResponse("No choices in response".to_string()))?
            .message;

        // Check if response contains tool calls
        if let Some(ref tool_calls) = message.tool_calls
            && !tool_calls.is_empty()
        {
            debug!("Received {} tool calls from {}", tool_calls.len(), endpoint.model);
            return Ok(ChatResult::ToolCalls {
                tool_calls: tool_calls.clone(),
                assistant_message: message,
            });
        }

        let reply = match message.content {
            Some(MessageContent::Text(text)) => text,
            Some(MessageContent::MultiPart(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        };

        debug!("Received response from {}", endpoint.model);
        Ok(ChatResult::TextResponse(reply))
    }
}

fn build_messages(request: &CompletionRequest) -> Vec<Message> {
    let system_prompt = format!(
        "{}\n\n{}\n\n{}",
        request.dynamic_context, request.system_prompt, REPLY_FORMAT_INSTRUCTIONS
    );

    let mut messages = vec![Message::text(MessageRole::System, system_prompt)];
    messages.extend(
        request
            .context
            .iter()
            .map(|entry| Message::text(entry.role, entry.render())),
    );
    messages
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &CompletionRequest,
    ) -> Result<ReplyOutput> {
        let mut messages = build_messages(request);
        let text = run_tool_loop(self, endpoint, &mut messages).await?;
        ReplyOutput::parse(&text)
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    async fn describe_image(&self, endpoint: &Endpoint, image_url: &str) -> Result<String> {
        let messages = vec![Message {
            role: MessageRole::User,
            content: Some(MessageContent::MultiPart(vec![
                ContentPart::Text {
                    text: DESCRIBE_IMAGE_PROMPT.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.to_string(),
                    },
                },
            ])),
            tool_calls: None,
            tool_call_id: None,
        }];

        match self.chat(endpoint, messages, VISION_MAX_TOKENS, None).await? {
            ChatResult::TextResponse(text) if !text.trim().is_empty() => {
                Ok(text.trim().to_string())
            }
            ChatResult::TextResponse(_) => Err(BotError::EndpointResponse(
                "Empty image description".to_string(),
            )),
            ChatResult::ToolCalls { .. } => Err(BotError::EndpointResponse(
                "Unexpected tool call while describing an image".to_string(),
            )),
        }
    }
}
