//! Misskey instance client: note models, REST calls and the streaming socket.

mod api;
mod models;
pub mod streaming;

pub use api::{MisskeyClient, NoteService};
pub use models::{DriveFile, NewNote, Note, User, Visibility};
