//! Note models as served by the instance API.

use serde::{Deserialize, Serialize};

/// Who may see a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Home,
    Followers,
    Specified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// `None` for users local to the instance
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl User {
    /// `@username` for local users, `@username@host` for remote ones.
    pub fn handle(&self) -> String {
        match &self.host {
            Some(host) => format!("@{}@{}", self.username, host),
            None => format!("@{}", self.username),
        }
    }
}

/// A drive file attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// MIME type
    #[serde(rename = "type")]
    pub content_type: String,
}

impl DriveFile {
    /// Thumbnail generated by the instance, if any. Never the full file.
    pub fn preview_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Content warning shown in front of the text
    #[serde(default)]
    pub cw: Option<String>,
    pub user_id: String,
    pub user: User,
    #[serde(default)]
    pub reply_id: Option<String>,
    #[serde(default)]
    pub renote_id: Option<String>,
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl Note {
    /// Text with surrounding whitespace removed, `None` when blank.
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// A note with neither text nor attachments carries nothing to answer.
    pub fn is_empty(&self) -> bool {
        self.content().is_none() && self.files.is_empty()
    }
}

/// Payload for `notes/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub visible_user_ids: Vec<String>,
}

impl NewNote {
    /// Reply to `note`, keeping its visibility.
    ///
    /// Direct notes stay addressed to their author.
    pub fn reply_to(note: &Note, text: String) -> Self {
        let visible_user_ids = if note.visibility == Visibility::Specified {
            vec![note.user_id.clone()]
        } else {
            Vec::new()
        };
        Self {
            text,
            reply_id: Some(note.id.clone()),
            visibility: note.visibility,
            visible_user_ids,
        }
    }
}
