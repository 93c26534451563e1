//! Persona HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/persona         - Current persona text
//! - PUT  /api/v1/persona         - Replace the persona (write-through)
//! - POST /api/v1/persona/refresh - Re-read the persona file
//!
//! Any change clears the response cache: cached replies were produced under
//! the previous persona.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestMeta};
use crate::state::AppState;

/// Request body for persona updates.
#[derive(Debug, Deserialize)]
pub struct UpdatePersonaBody {
    pub persona_content: String,
}

#[derive(Debug, Serialize)]
pub struct PersonaView {
    pub persona_content: String,
    pub source: String,
    /// False while the built-in default persona is in use.
    pub loaded: bool,
}

async fn view(state: &AppState) -> PersonaView {
    let persona = state.persona_service.persona();
    PersonaView {
        persona_content: persona.current().await,
        source: state.persona_service.location(),
        loaded: persona.is_loaded(),
    }
}

/// GET /api/v1/persona
pub async fn get_persona(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PersonaView>>, AppError> {
    let meta = RequestMeta::start();
    let data = view(&state).await;
    Ok(Json(meta.respond(data).with_link("self", "/api/v1/persona")))
}

/// PUT /api/v1/persona
pub async fn update_persona(
    State(state): State<AppState>,
    Json(body): Json<UpdatePersonaBody>,
) -> Result<Json<ApiResponse<PersonaView>>, AppError> {
    let meta = RequestMeta::start();

    state.persona_service.update(&body.persona_content).await?;
    state.cache.clear();

    let data = view(&state).await;
    Ok(Json(meta.respond(data).with_link("self", "/api/v1/persona")))
}

/// POST /api/v1/persona/refresh
pub async fn refresh_persona(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PersonaView>>, AppError> {
    let meta = RequestMeta::start();

    state.persona_service.refresh().await?;
    state.cache.clear();

    let data = view(&state).await;
    Ok(Json(meta.respond(data).with_link("self", "/api/v1/persona")))
}
