//! Dynamic context building for system prompts.

use std::fmt::Write;

use chrono::Utc;

use crate::misskey::Note;

/// Builds dynamic context information for the system prompt.
pub fn build_dynamic_context(note: &Note) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let user = &note.user;

    let mut context = String::from(
        "You are a bot on a Misskey instance. Users interact with you by mentioning you in notes.",
    );

    let _ = write!(context, "\nCurrent datetime: {timestamp}");

    match &user.name {
        Some(name) => {
            let _ = write!(context, "\nUser: {} ({})", name, user.handle());
        }
        None => {
            let _ = write!(context, "\nUser: {}", user.handle());
        }
    }

    if let Some(location) = user.location.as_deref().filter(|l| !l.trim().is_empty()) {
        let _ = write!(context, "\nUser location: {location}");
    }

    context
}
