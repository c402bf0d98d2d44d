//! Tool execution loop for completion requests.

use log::{debug, warn};

use crate::error::{BotError, Result};
use crate::tools::ToolExecutor;
use crate::types::{Endpoint, MessageRole};

use super::openai::{ChatResult, Message, MessageContent, OpenAiBackend};

const MAX_TOOL_ITERATIONS: usize = 5;

/// Run the tool execution loop until the model answers with text.
pub async fn run_tool_loop(
    backend: &OpenAiBackend,
    endpoint: &Endpoint,
    messages: &mut Vec<Message>,
) -> Result<String> {
    let definitions = backend.tools().definitions();
    let tools = (!definitions.is_empty()).then_some(definitions);

    for _ in 0..MAX_TOOL_ITERATIONS {
        match backend
            .chat(endpoint, messages.clone(), backend.max_tokens(), tools.clone())
            .await?
        {
            ChatResult::TextResponse(text) => return Ok(text),
            ChatResult::ToolCalls {
                tool_calls,
                assistant_message,
            } => {
                debug!("Processing {} tool calls", tool_calls.len());
                messages.push(assistant_message);

                for tool_call in tool_calls {
                    let result_text = match ToolExecutor::execute(
                        &tool_call.function.name,
                        &tool_call.function.arguments,
                        backend.tools(),
                        backend.http(),
                    )
                    .await
                    {
                        Ok(output) => output,
                        Err(e) => {
                            warn!("Tool execution failed: {e}");
                            format!("Error: {e}")
                        }
                    };

                    messages.push(Message {
                        role: MessageRole::Tool,
                        content: Some(MessageContent::Text(result_text)),
                        tool_calls: None,
                        tool_call_id: Some(tool_call.id),
                    });
                }
            }
        }
    }

    Err(BotError::ToolLoopLimit)
}
