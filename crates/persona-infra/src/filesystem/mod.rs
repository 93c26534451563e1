//! Filesystem adapters.
//!
//! All operations go through `tokio::fs` for async I/O.

pub mod persona;
