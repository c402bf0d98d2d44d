//! Mention routing and bot lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{Id, JoinError, JoinSet};

use crate::chatbot::handle_mention;
use crate::config::Config;
use crate::dispatch::FallbackDispatcher;
use crate::error::Result;
use crate::llm::{CompletionBackend, OpenAiBackend, VisionBackend};
use crate::misskey::streaming::{StreamEvent, StreamingClient};
use crate::misskey::{MisskeyClient, NoteService};
use crate::tools::ToolSet;

const EVENT_BUFFER: usize = 64;

/// Read-only state shared by every mention task.
pub struct Data {
    pub config: Config,
    pub notes: Arc<dyn NoteService>,
    pub completion: Arc<dyn CompletionBackend>,
    pub vision: Arc<dyn VisionBackend>,
    pub dispatcher: FallbackDispatcher,
}

/// Run the bot until a shutdown signal arrives.
pub async fn run() -> Result<()> {
    info!("Initializing bot");
    let config = Config::from_env()?;

    debug!("Initializing instance and model clients");
    let notes = Arc::new(MisskeyClient::new(
        config.instance_url.clone(),
        config.token.clone(),
        config.request_timeout,
    )?);
    let backend = Arc::new(OpenAiBackend::new(
        config.max_tokens,
        ToolSet {
            datetime: true,
            web_search: config.web_search.clone(),
        },
        config.request_timeout,
    )?);
    let streaming = StreamingClient::new(config.streaming_url.clone(), config.token.clone());

    let data = Arc::new(Data {
        config,
        notes,
        completion: backend.clone(),
        vision: backend,
        dispatcher: FallbackDispatcher::default(),
    });

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router = tokio::spawn(route_events(data, events_rx));
    let mut streaming = tokio::spawn(async move { streaming.run(events_tx, shutdown_rx).await });

    let signalled = tokio::select! {
        result = &mut streaming => {
            result??;
            false
        }
        () = shutdown_signal() => true,
    };
    if signalled {
        info!("Shutdown signal received, shutting down...");
        // The streaming task may already be gone, nothing to notify then.
        let _ = shutdown_tx.send(true);
        streaming.await??;
    }

    info!("Waiting for in-flight mentions to finish");
    router.await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Consumes streaming events, spawning one independent task per mention.
///
/// Returns once the event channel closes and every spawned task finished.
pub async fn route_events(data: Arc<Data>, mut events: mpsc::Receiver<StreamEvent>) {
    let limiter = data
        .config
        .max_concurrent_mentions
        .map(|permits| Arc::new(Semaphore::new(permits)));
    let mut units = JoinSet::new();
    let mut in_flight: HashMap<Id, String> = HashMap::new();

    while let Some(event) = events.recv().await {
        while let Some(finished) = units.try_join_next_with_id() {
            reap(&mut in_flight, finished);
        }

        let StreamEvent::Mention(note) = event;
        if note.user_id == data.config.identity.user_id {
            debug!("Ignoring own mention {}", note.id);
            continue;
        }
        if note.is_empty() {
            debug!("Ignoring mention {} without text or files", note.id);
            continue;
        }

        let note_id = note.id.clone();
        let data = Arc::clone(&data);
        let limiter = limiter.clone();
        let handle = units.spawn(async move {
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };
            if let Err(e) = handle_mention(&data, &note).await {
                error!("[{}] Failed to process mention: {e}", note.id);
            }
        });
        in_flight.insert(handle.id(), note_id);
    }

    debug!("Event stream ended, draining {} mention tasks", units.len());
    while let Some(finished) = units.join_next_with_id().await {
        reap(&mut in_flight, finished);
    }
}

fn reap(in_flight: &mut HashMap<Id, String>, finished: std::result::Result<(Id, ()), JoinError>) {
    match finished {
        Ok((id, ())) => {
            in_flight.remove(&id);
        }
        Err(e) => {
            let note_id = in_flight.remove(&e.id()).unwrap_or_default();
            error!("[{note_id}] Mention task crashed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{CompletionRequest, ReplyOutput};
    use crate::testing::{BOT_ID, FakeCompletion, FakeNotes, FakeVision, config, note, user};
    use crate::types::Endpoint;

    fn data(
        notes: Arc<FakeNotes>,
        completion: Arc<dyn CompletionBackend>,
        llm_models: &[&str],
    ) -> Arc<Data> {
        Arc::new(Data {
            config: config(llm_models, &[]),
            notes,
            completion,
            vision: Arc::new(FakeVision),
            dispatcher: FallbackDispatcher::new(Duration::ZERO),
        })
    }

    async fn route(data: Arc<Data>, events: Vec<StreamEvent>) {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap_or_else(|e| panic!("send failed: {e}"));
        }
        drop(tx);
        route_events(data, rx).await;
    }

    fn mention(id: &str, author_id: &str, username: &str) -> StreamEvent {
        StreamEvent::Mention(Box::new(note(
            id,
            Some("@bot hello"),
            &user(author_id, username, None),
            None,
        )))
    }

    #[tokio::test]
    async fn replies_to_every_mention() {
        let notes = Arc::new(FakeNotes::default());
        let completion = Arc::new(FakeCompletion::answering("hi", &[]));
        let data = data(notes.clone(), completion, &["primary"]);

        route(
            data,
            vec![mention("n1", "u1", "alice"), mention("n2", "u2", "bob")],
        )
        .await;

        let mut replies: Vec<_> = notes
            .created()
            .into_iter()
            .map(|note| (note.reply_id.unwrap_or_default(), note.text))
            .collect();
        replies.sort();
        assert_eq!(
            replies,
            vec![
                ("n1".to_string(), "@alice hi".to_string()),
                ("n2".to_string(), "@bob hi".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn ignores_own_and_empty_mentions() {
        let notes = Arc::new(FakeNotes::default());
        let completion = Arc::new(FakeCompletion::answering("hi", &[]));
        let data = data(notes.clone(), completion.clone(), &["primary"]);
        let empty = StreamEvent::Mention(Box::new(note("n3", None, &user("u1", "alice", None), None)));

        route(data, vec![mention("n1", BOT_ID, "bot"), empty]).await;

        assert!(completion.calls().is_empty());
        assert!(notes.created().is_empty());
    }

    #[tokio::test]
    async fn exhausted_endpoints_send_nothing() {
        let notes = Arc::new(FakeNotes::default());
        let completion = Arc::new(FakeCompletion::answering("hi", &[]));
        let data = data(notes.clone(), completion.clone(), &["fail-1", "fail-2"]);

        route(data, vec![mention("n1", "u1", "alice")]).await;

        assert_eq!(completion.calls(), vec!["fail-1", "fail-2"]);
        assert!(notes.created().is_empty());
    }

    /// Panics for one note, answers for the rest.
    struct PanickyCompletion;

    #[async_trait]
    impl CompletionBackend for PanickyCompletion {
        async fn complete(
            &self,
            _endpoint: &Endpoint,
            request: &CompletionRequest,
        ) -> crate::error::Result<ReplyOutput> {
            if request.context.iter().any(|entry| entry.note_id == "boom") {
                panic!("backend exploded");
            }
            Ok(ReplyOutput {
                reply: "fine".to_string(),
                mentions: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn crashing_mention_does_not_affect_others() {
        let notes = Arc::new(FakeNotes::default());
        let data = data(notes.clone(), Arc::new(PanickyCompletion), &["primary"]);

        route(
            data,
            vec![mention("boom", "u1", "alice"), mention("n2", "u2", "bob")],
        )
        .await;

        let created = notes.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].text, "@bob fine");
    }

    #[tokio::test]
    async fn bounded_pool_still_answers_everyone() {
        let notes = Arc::new(FakeNotes::default());
        let completion = Arc::new(FakeCompletion::answering("hi", &[]));
        let mut config = config(&["primary"], &[]);
        config.max_concurrent_mentions = Some(1);
        let data = Arc::new(Data {
            config,
            notes: notes.clone(),
            completion,
            vision: Arc::new(FakeVision),
            dispatcher: FallbackDispatcher::new(Duration::ZERO),
        });

        let events = (0..5)
            .map(|i| mention(&format!("n{i}"), &format!("u{i}"), &format!("user{i}")))
            .collect();
        route(data, events).await;

        assert_eq!(notes.created().len(), 5);
    }
}
