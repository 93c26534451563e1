//! Observability setup for the persona chat backend.

pub mod tracing_setup;
