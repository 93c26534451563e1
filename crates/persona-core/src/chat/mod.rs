//! Conversation handling: persistence port, prompt assembly, summarization,
//! phase tagging, and the chat engine that ties them together.

pub mod context;
pub mod engine;
pub mod phase;
pub mod repository;
pub mod summarizer;
