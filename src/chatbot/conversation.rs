//! Conversation history building from note reply chains.

use std::collections::HashSet;

use log::{debug, warn};

use crate::misskey::{Note, NoteService};
use crate::types::{ContextEntry, MessageRole};

/// Converts a note into a context entry, `None` when it has nothing to say.
fn note_to_entry(note: &Note, bot_user_id: &str) -> Option<ContextEntry> {
    if note.is_empty() {
        return None;
    }
    let role = if note.user_id == bot_user_id {
        MessageRole::Assistant
    } else {
        MessageRole::User
    };
    let text = match (note.cw.as_deref(), note.content()) {
        (Some(cw), Some(text)) => format!("[CW: {cw}] {text}"),
        (Some(cw), None) => format!("[CW: {cw}]"),
        (None, text) => text.unwrap_or_default().to_string(),
    };
    Some(ContextEntry {
        note_id: note.id.clone(),
        role,
        author: note.user.handle(),
        text,
        files: note.files.clone(),
        image_descriptions: Vec::new(),
    })
}

/// Builds the conversation transcript by walking up the reply chain.
///
/// Starts at `note` and follows `replyId` for at most `max_depth` hops.
/// Renoted notes are placed right before the note that quotes them, unless the
/// renote is also the parent the walk visits next. A failed fetch ends the
/// walk with whatever was gathered so far. Entries come back oldest first.
pub async fn build_context(
    notes: &dyn NoteService,
    note: &Note,
    max_depth: usize,
    bot_user_id: &str,
) -> Vec<ContextEntry> {
    let mut history = Vec::new();
    let mut visited = HashSet::new();
    let mut renoted = HashSet::new();
    let mut current = note.clone();

    for depth in 0..=max_depth {
        visited.insert(current.id.clone());

        match note_to_entry(&current, bot_user_id) {
            Some(entry) => history.push(entry),
            None => debug!("Skipping empty note {} in context", current.id),
        }

        // A quote-reply renotes its own parent; the walk picks that up as a chain node.
        let walks_to_renote = depth < max_depth && current.renote_id == current.reply_id;
        if let Some(renote_id) = current.renote_id.as_deref()
            && !walks_to_renote
            && !visited.contains(renote_id)
            && renoted.insert(renote_id.to_string())
        {
            match notes.get_note(renote_id).await {
                Ok(renote) => history.extend(note_to_entry(&renote, bot_user_id)),
                Err(e) => warn!("Failed to fetch renote {renote_id} of {}: {e}", current.id),
            }
        }

        if depth == max_depth {
            break;
        }
        let Some(reply_id) = current.reply_id.clone() else {
            break;
        };
        if visited.contains(&reply_id) {
            warn!("Reply chain of {} loops back to {reply_id}", note.id);
            break;
        }

        current = match notes.get_note(&reply_id).await {
            Ok(parent) => parent,
            Err(e) => {
                warn!("Failed to fetch note {reply_id} in reply chain: {e}");
                break;
            }
        };
    }

    // Reverse to get chronological order
    history.reverse();
    history
}
