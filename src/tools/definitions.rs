//! Tool definitions for the chat completions tool calling API.

use serde_json::json;

use crate::llm::{FunctionDefinition, Tool};

use super::web_search::WebSearchConfig;

pub const DATETIME_TOOL: &str = "get_datetime";
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// The fixed set of capabilities offered to the model.
///
/// New tools are added here as fields, never attached at runtime.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    pub datetime: bool,
    /// Web search is only offered when a search backend is configured
    pub web_search: Option<WebSearchConfig>,
}

impl ToolSet {
    /// Returns the tool definitions for the enabled capabilities.
    pub fn definitions(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        if self.datetime {
            tools.push(Tool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: DATETIME_TOOL.to_string(),
                    description: "Get the current date, time and weekday in UTC. Use when the \
                        user asks about the current time or relative dates."
                        .to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {},
                        "required": []
                    }),
                },
            });
        }
        if self.web_search.is_some() {
            tools.push(Tool {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: WEB_SEARCH_TOOL.to_string(),
                    description: "Search the web for current information, news, or facts. \
                        Use when the user asks about recent events or topics that may have \
                        changed since your knowledge cutoff."
                        .to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The search query"
                            }
                        },
                        "required": ["query"]
                    }),
                },
            });
        }
        tools
    }
}
