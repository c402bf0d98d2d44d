//! Web search tool backed by a SearXNG instance.

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::{BotError, Result};

/// Number of search results handed to the model
const MAX_RESULTS: usize = 5;

/// Where and how to reach the search backend.
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub url: Url,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Arguments for the `web_search` tool
#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    content: Option<String>,
}

/// Run a search and join the top result snippets.
pub async fn web_search(
    arguments: &str,
    config: &WebSearchConfig,
    client: &reqwest::Client,
) -> Result<String> {
    let args: WebSearchArgs = serde_json::from_str(arguments)?;

    debug!("Performing web search for: {}", args.query);

    let mut request = client
        .post(format!("{}/search", config.url.as_str().trim_end_matches('/')))
        .query(&[("q", args.query.as_str()), ("format", "json")]);
    if let (Some(user), Some(password)) = (&config.user, &config.password) {
        request = request.basic_auth(user, Some(password));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(BotError::ToolExecution(format!(
            "Search backend returned {}",
            response.status()
        )));
    }

    let results: SearchResponse = response.json().await?;
    let snippets: Vec<String> = results
        .results
        .into_iter()
        .filter_map(|result| result.content)
        .filter(|content| !content.trim().is_empty())
        .take(MAX_RESULTS)
        .collect();

    debug!("Web search returned {} snippets", snippets.len());

    if snippets.is_empty() {
        return Ok("No results found.".to_string());
    }
    Ok(snippets.join("\n---\n"))
}
