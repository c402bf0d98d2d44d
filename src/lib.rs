pub mod bot;
pub mod chatbot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod media;
pub mod misskey;
pub mod tools;
pub mod types;

#[cfg(test)]
mod testing;

pub use bot::run;
