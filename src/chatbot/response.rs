//! Reply composition: mention prefix plus model text.

use crate::config::BotIdentity;
use crate::llm::ReplyOutput;
use crate::misskey::Note;

/// A user to be mentioned, `host` is `None` for local users.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MentionTarget {
    username: String,
    host: Option<String>,
}

impl MentionTarget {
    /// Parses `alice`, `@alice` or `@alice@host`.
    fn parse(raw: &str, local_domain: &str) -> Option<Self> {
        let raw = raw.trim().trim_start_matches('@');
        let (username, host) = match raw.split_once('@') {
            Some((username, host)) => (username, Some(host)),
            None => (raw, None),
        };
        let username = username.trim();
        if username.is_empty() || username.contains(char::is_whitespace) {
            return None;
        }
        let host = host
            .map(str::trim)
            .filter(|host| !host.is_empty() && !host.eq_ignore_ascii_case(local_domain))
            .map(str::to_string);
        Some(Self {
            username: username.to_string(),
            host,
        })
    }

    fn is_bot(&self, identity: &BotIdentity) -> bool {
        self.host.is_none() && self.username.eq_ignore_ascii_case(&identity.username)
    }

    /// A bare username matches any known user with that name.
    fn same_user(&self, other: &Self) -> bool {
        if !self.username.eq_ignore_ascii_case(&other.username) {
            return false;
        }
        match (&self.host, &other.host) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => true,
        }
    }

    fn render(&self) -> String {
        match &self.host {
            Some(host) => format!("@{}@{}", self.username, host),
            None => format!("@{}", self.username),
        }
    }
}

/// Renders the outgoing note text for a model reply.
///
/// The inbound author is mentioned first, followed by the users the model
/// asked to address. The bot itself is never mentioned and every user is
/// mentioned once. The result is cut to `max_length` characters.
pub fn compose_reply(
    output: &ReplyOutput,
    inbound: &Note,
    identity: &BotIdentity,
    max_length: usize,
) -> String {
    let author = MentionTarget {
        username: inbound.user.username.clone(),
        host: inbound
            .user
            .host
            .clone()
            .filter(|host| !host.eq_ignore_ascii_case(&identity.domain)),
    };

    let candidates = std::iter::once(author).chain(
        output
            .mentions
            .iter()
            .filter_map(|raw| MentionTarget::parse(raw, &identity.domain)),
    );

    let mut targets: Vec<MentionTarget> = Vec::new();
    for candidate in candidates {
        if candidate.is_bot(identity) || targets.iter().any(|t| candidate.same_user(t)) {
            continue;
        }
        targets.push(candidate);
    }

    let mut text = targets
        .iter()
        .map(MentionTarget::render)
        .collect::<Vec<_>>()
        .join(" ");
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(output.reply.trim());

    if text.chars().count() > max_length {
        text = text.chars().take(max_length).collect();
    }
    text
}
