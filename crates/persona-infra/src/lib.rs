//! Infrastructure layer for the persona chat backend.
//!
//! Contains implementations of the traits defined in `persona-core`: SQLite
//! conversation storage, the OpenAI-compatible LLM provider, the persona file
//! store, and the startup configuration loader.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod sqlite;
