//! Tool executor for dispatching tool calls.

use log::{debug, warn};

use crate::error::{BotError, Result};

use super::datetime::get_datetime;
use super::definitions::{DATETIME_TOOL, ToolSet, WEB_SEARCH_TOOL};
use super::web_search::web_search;

/// Executor for the enabled tools
pub struct ToolExecutor;

impl ToolExecutor {
    /// Execute a tool by name with the given JSON arguments
    pub async fn execute(
        name: &str,
        arguments: &str,
        tools: &ToolSet,
        client: &reqwest::Client,
    ) -> Result<String> {
        debug!("Executing tool '{name}' with args: {arguments}");

        match (name, &tools.web_search) {
            (DATETIME_TOOL, _) if tools.datetime => Ok(get_datetime()),
            (WEB_SEARCH_TOOL, Some(config)) => web_search(arguments, config, client).await,
            _ => {
                warn!("Unknown tool requested: {name}");
                Err(BotError::ToolExecution(format!("Unknown tool: {name}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_tools_are_unknown() {
        let client = reqwest::Client::new();
        let result = ToolExecutor::execute(WEB_SEARCH_TOOL, "{}", &ToolSet::default(), &client).await;
        assert!(matches!(result, Err(BotError::ToolExecution(_))));

        let result = ToolExecutor::execute(DATETIME_TOOL, "{}", &ToolSet::default(), &client).await;
        assert!(matches!(result, Err(BotError::ToolExecution(_))));
    }

    #[tokio::test]
    async fn datetime_tool_answers_when_enabled() -> Result<()> {
        let tools = ToolSet {
            datetime: true,
            web_search: None,
        };
        let output = ToolExecutor::execute(DATETIME_TOOL, "{}", &tools, &reqwest::Client::new()).await?;
        assert!(output.ends_with("UTC"));
        Ok(())
    }
}
