//! Main handler for bot mentions.

use log::{debug, info};

use crate::bot::Data;
use crate::error::Result;
use crate::llm::CompletionRequest;
use crate::media::{attach_descriptions, describe_images};
use crate::misskey::{DriveFile, NewNote, Note};
use crate::types::EndpointKind;

use super::context::build_dynamic_context;
use super::conversation::build_context;
use super::response::compose_reply;

const LOG_PREVIEW_CHARS: usize = 100;

/// Single-line, clipped note text for logs.
fn log_preview(note: &Note) -> String {
    note.text
        .as_deref()
        .unwrap_or_default()
        .replace('\n', "⏎")
        .chars()
        .take(LOG_PREVIEW_CHARS)
        .collect()
}

/// Processes one mention from context building to the posted reply.
///
/// Nothing is posted when every completion endpoint fails.
pub async fn handle_mention(data: &Data, note: &Note) -> Result<()> {
    let config = &data.config;
    info!(
        "Received note {} from {}: {}",
        note.id,
        note.user.handle(),
        log_preview(note)
    );

    let mut context = build_context(
        data.notes.as_ref(),
        note,
        config.max_context,
        &config.identity.user_id,
    )
    .await;
    debug!("[{}] Context has {} entries", note.id, context.len());

    let attachments: Vec<DriveFile> = context
        .iter()
        .flat_map(|entry| entry.files.iter().cloned())
        .collect();
    let descriptions = describe_images(
        data.vision.as_ref(),
        &data.dispatcher,
        &config.vision_endpoints,
        &attachments,
        &note.id,
    )
    .await;
    attach_descriptions(&mut context, &descriptions);

    let request = CompletionRequest {
        system_prompt: config.system_prompt.clone(),
        dynamic_context: build_dynamic_context(note),
        context,
    };

    let output = data
        .dispatcher
        .dispatch(
            EndpointKind::Completion,
            &config.llm_endpoints,
            &note.id,
            |endpoint| data.completion.complete(endpoint, &request),
        )
        .await?;
    debug!("[{}] Model reply: {:?}", note.id, output);

    let text = compose_reply(&output, note, &config.identity, config.max_note_length);
    let created = data.notes.create_note(NewNote::reply_to(note, text)).await?;
    info!("Replied to {} with note {}", note.id, created.id);

    Ok(())
}
