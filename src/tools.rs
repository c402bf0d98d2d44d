//! Tools the completion backend may call while composing a reply.

mod datetime;
mod definitions;
mod executor;
mod web_search;

pub use definitions::ToolSet;
pub use executor::ToolExecutor;
pub use web_search::WebSearchConfig;
