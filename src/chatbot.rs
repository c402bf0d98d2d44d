//! AI chatbot module - turns a mention into a reply.

mod context;
mod conversation;
mod handler;
mod response;

pub use conversation::build_context;
pub use handler::handle_mention;
pub use response::compose_reply;
