use std::env::{self, VarError};
use std::time::Duration;

use log::{debug, error, info};
use url::Url;

use crate::error::{BotError, Result};
use crate::tools::WebSearchConfig;
use crate::types::Endpoint;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_MAX_CONTEXT: usize = 1;
// Misskey's default maximum note length
const DEFAULT_MAX_NOTE_LENGTH: usize = 3000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Who the bot is on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub username: String,
    /// Domain of the instance the bot lives on
    pub domain: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub instance_url: Url,
    pub streaming_url: Url,
    pub token: String,
    pub identity: BotIdentity,
    pub system_prompt: String,
    pub llm_endpoints: Vec<Endpoint>,
    pub vision_endpoints: Vec<Endpoint>,
    pub max_tokens: u32,
    pub max_context: usize,
    pub max_note_length: usize,
    pub max_concurrent_mentions: Option<usize>,
    /// Upper bound on a single HTTP request to the instance or an endpoint
    pub request_timeout: Duration,
    pub web_search: Option<WebSearchConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key))
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, VarError>,
    {
        let required = |key: &str| {
            lookup(key).map_err(|e| {
                error!("Failed to load {key} from environment: {e}");
                BotError::EnvVar(e)
            })
        };
        let optional = |key: &str| lookup(key).ok().filter(|value| !value.trim().is_empty());

        let instance_url = parse_url("INSTANCE_URL", &required("INSTANCE_URL")?)?;
        let streaming_url = match optional("STREAMING_URL") {
            Some(raw) => parse_url("STREAMING_URL", &raw)?,
            None => streaming_url_for(&instance_url)?,
        };
        let token = required("INSTANCE_TOKEN")?;
        let identity = BotIdentity {
            user_id: required("BOT_USER_ID")?,
            username: required("BOT_USERNAME")?,
            domain: required("INSTANCE_DOMAIN")?,
        };
        let system_prompt = required("SYSTEM_PROMPT")?;

        let llm_endpoints = parse_endpoints("LLM_ENDPOINTS", &required("LLM_ENDPOINTS")?)?;
        if llm_endpoints.is_empty() {
            return Err(BotError::Config(
                "LLM_ENDPOINTS must list at least one endpoint".to_string(),
            ));
        }
        let vision_endpoints = match optional("VISION_ENDPOINTS") {
            Some(raw) => parse_endpoints("VISION_ENDPOINTS", &raw)?,
            None => Vec::new(),
        };

        let max_tokens = parse_number("MAX_TOKENS", optional("MAX_TOKENS"))?
            .unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(BotError::Config(
                "MAX_TOKENS must be greater than 0".to_string(),
            ));
        }
        let max_context = parse_number("MAX_CONTEXT", optional("MAX_CONTEXT"))?
            .unwrap_or(DEFAULT_MAX_CONTEXT);
        let max_note_length = parse_number("MAX_NOTE_LENGTH", optional("MAX_NOTE_LENGTH"))?
            .unwrap_or(DEFAULT_MAX_NOTE_LENGTH);
        let max_concurrent_mentions =
            parse_number("MAX_CONCURRENT_MENTIONS", optional("MAX_CONCURRENT_MENTIONS"))?;
        if max_concurrent_mentions == Some(0) {
            return Err(BotError::Config(
                "MAX_CONCURRENT_MENTIONS must be greater than 0".to_string(),
            ));
        }

        let request_timeout_secs =
            parse_number("REQUEST_TIMEOUT_SECS", optional("REQUEST_TIMEOUT_SECS"))?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(BotError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        let request_timeout = Duration::from_secs(request_timeout_secs);

        let web_search = match optional("SEARXNG_URL") {
            Some(raw) => Some(WebSearchConfig {
                url: parse_url("SEARXNG_URL", &raw)?,
                user: optional("SEARXNG_USER"),
                password: optional("SEARXNG_PASSWORD"),
            }),
            None => None,
        };

        info!("Configuration loaded successfully");
        debug!("Instance: {instance_url} (streaming: {streaming_url})");
        debug!("Instance token length: {} characters", token.len());
        debug!(
            "Bot identity: @{}@{} ({})",
            identity.username, identity.domain, identity.user_id
        );
        debug!(
            "{} completion endpoints, {} vision endpoints",
            llm_endpoints.len(),
            vision_endpoints.len()
        );
        debug!("HTTP request timeout: {}s", request_timeout.as_secs());
        debug!("System prompt length: {} characters", system_prompt.len());

        Ok(Self {
            instance_url,
            streaming_url,
            token,
            identity,
            system_prompt,
            llm_endpoints,
            vision_endpoints,
            max_tokens,
            max_context,
            max_note_length,
            max_concurrent_mentions,
            request_timeout,
            web_search,
        })
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| BotError::Config(format!("{key} is not a valid URL: {e}")))
}

fn parse_endpoints(key: &str, raw: &str) -> Result<Vec<Endpoint>> {
    serde_json::from_str(raw)
        .map_err(|e| BotError::Config(format!("{key} is not a valid endpoint list: {e}")))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|_| BotError::Config(format!("{key} must be a non-negative integer")))
    })
    .transpose()
}

/// Derives the websocket base URL from the instance URL.
fn streaming_url_for(instance_url: &Url) -> Result<Url> {
    let mut url = instance_url.clone();
    let scheme = if instance_url.scheme() == "http" {
        "ws"
    } else {
        "wss"
    };
    url.set_scheme(scheme).map_err(|()| {
        BotError::Config(format!("Cannot derive streaming URL from {instance_url}"))
    })?;
    Ok(url)
}
