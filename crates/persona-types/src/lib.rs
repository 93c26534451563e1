//! Shared domain types for the persona chat backend.
//!
//! Conversations, messages, summaries, LLM wire types, health/status reports,
//! runtime configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod status;
