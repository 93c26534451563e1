//! Axum router configuration with middleware.
//!
//! Envelope routes are under `/api/v1/`; `/` and `/health` return plain JSON.
//! Middleware: CORS (any origin) and HTTP request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat
        .route("/chat", post(handlers::chat::chat))
        .route("/chat/stream", post(handlers::chat::stream_chat))
        // Conversations
        .route(
            "/conversations",
            post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(handlers::conversation::get_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversations/{id}/history",
            get(handlers::conversation::get_history),
        )
        .route(
            "/conversations/{id}/summaries",
            get(handlers::conversation::get_summaries),
        )
        // Persona
        .route(
            "/persona",
            get(handlers::persona::get_persona).put(handlers::persona::update_persona),
        )
        .route("/persona/refresh", post(handlers::persona::refresh_persona))
        // Status
        .route("/system/status", get(handlers::system::system_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
