use reqwest::StatusCode;
use thiserror::Error;

use crate::types::EndpointKind;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Rate limited by the instance")]
    RateLimited,

    #[error("Instance API error ({status}): {message}")]
    InstanceApi { status: StatusCode, message: String },

    #[error("Endpoint API error ({status}): {message}")]
    EndpointApi { status: StatusCode, message: String },

    #[error("Endpoint response error: {0}")]
    EndpointResponse(String),

    #[error("Reply did not match the expected schema: {0}")]
    Schema(String),

    #[error("All {attempts} {kind} endpoints failed")]
    AllEndpointsExhausted { kind: EndpointKind, attempts: usize },

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Tool loop limit exceeded")]
    ToolLoopLimit,
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
