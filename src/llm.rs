//! Language and vision model backends.

mod backend;
mod openai;
mod tool_loop;

pub use backend::{CompletionBackend, CompletionRequest, ReplyOutput, VisionBackend};
pub use openai::{FunctionDefinition, OpenAiBackend, Tool};
