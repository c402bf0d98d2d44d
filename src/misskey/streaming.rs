//! Streaming API connection with automatic reconnect.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::Result;

use super::models::Note;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAIN_CHANNEL_ID: &str = "relaybot-main";

/// Typed events delivered by the streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Someone mentioned the bot.
    Mention(Box<Note>),
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    body: Option<ChannelFrame>,
}

#[derive(Debug, Deserialize)]
struct ChannelFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
}

/// Parses one text frame, returning `None` for anything that is not a mention.
pub fn parse_stream_message(raw: &str) -> Option<StreamEvent> {
    let frame: Frame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Ignoring malformed streaming frame: {e}");
            return None;
        }
    };
    if frame.kind != "channel" {
        return None;
    }
    let channel = frame.body?;
    if channel.kind.as_deref() != Some("mention") {
        return None;
    }
    match serde_json::from_value::<Note>(channel.body?) {
        Ok(note) => Some(StreamEvent::Mention(Box::new(note))),
        Err(e) => {
            debug!("Mention frame doesn't match the note format, ignoring: {e}");
            None
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

pub struct StreamingClient {
    base_url: Url,
    token: String,
    reconnect_delay: Duration,
}

impl StreamingClient {
    pub fn new(base_url: Url, token: String) -> Self {
        Self {
            base_url,
            token,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn socket_url(&self) -> String {
        format!(
            "{}/streaming?i={}",
            self.base_url.as_str().trim_end_matches('/'),
            self.token
        )
    }

    /// Keeps a subscription to the main channel alive until shutdown is signalled
    /// or the event receiver goes away.
    pub async fn run(
        &self,
        events: mpsc::Sender<StreamEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("Connecting to streaming API at {}", self.base_url);
        loop {
            match self.session(&events, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    info!("Streaming connection shut down");
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => warn!("WebSocket connection closed, reconnecting..."),
                Err(e) => warn!("WebSocket error: {e}, reconnecting..."),
            }

            if events.is_closed() || *shutdown.borrow() {
                return Ok(());
            }
            tokio::select! {
                () = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn session(
        &self,
        events: &mpsc::Sender<StreamEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd> {
        let socket = tokio::select! {
            connected = connect_async(self.socket_url()) => connected?.0,
            _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = socket.split();

        let subscribe = json!({
            "type": "connect",
            "body": {"channel": "main", "id": MAIN_CHANNEL_ID},
        });
        write.send(Message::Text(subscribe.to_string().into())).await?;
        info!("WebSocket connected, subscribed to main channel");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("Failed to close WebSocket cleanly: {e}");
                    }
                    return Ok(SessionEnd::Shutdown);
                }
                frame = read.next() => match frame {
                    None | Some(Ok(Message::Close(_))) => return Ok(SessionEnd::Closed),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_stream_message(text.as_str())
                            && events.send(event).await.is_err()
                        {
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}
