//! Chat engine, context management, caching, and port traits for the persona
//! chat backend.
//!
//! This crate defines the "ports" (repository, persona store, and LLM provider
//! traits) that the infrastructure layer implements. It depends only on
//! `persona-types` -- never on `persona-infra` or any database/IO crate.

pub mod cache;
pub mod chat;
pub mod health;
pub mod llm;
pub mod metrics;
pub mod persona;

#[cfg(test)]
pub(crate) mod test_support;
