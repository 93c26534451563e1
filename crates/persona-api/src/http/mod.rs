//! HTTP/REST API layer.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format, SSE
//! chat streaming, and CORS support. `/health` and `/` sit outside the
//! envelope.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
