//! Conversation HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/conversations                - Create a conversation
//! - GET    /api/v1/conversations/{id}           - Get a conversation
//! - GET    /api/v1/conversations/{id}/history   - All messages, oldest first
//! - GET    /api/v1/conversations/{id}/summaries - All summaries, oldest first
//! - DELETE /api/v1/conversations/{id}           - Delete with messages and summaries

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use persona_core::chat::engine::MAX_CONVERSATION_ID_CHARS;
use persona_core::chat::repository::ConversationRepository;
use persona_types::chat::{ANONYMOUS_USER_ID, ChatMessage, Conversation, ConversationSummary};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestMeta};
use crate::state::AppState;

/// Request body for conversation creation.
#[derive(Debug, Deserialize)]
pub struct CreateConversationBody {
    /// Caller-chosen id; a new one is minted when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Conversation plus its current message count.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub message_count: u32,
}

fn validate_conversation_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::Validation("conversation_id must not be empty".to_string()));
    }
    if id.chars().count() > MAX_CONVERSATION_ID_CHARS {
        return Err(AppError::Validation(format!(
            "conversation_id must be at most {MAX_CONVERSATION_ID_CHARS} characters"
        )));
    }
    Ok(())
}

fn links<T: Serialize>(resp: ApiResponse<T>, id: &str) -> ApiResponse<T> {
    resp.with_link("self", &format!("/api/v1/conversations/{id}"))
        .with_link("history", &format!("/api/v1/conversations/{id}/history"))
        .with_link("summaries", &format!("/api/v1/conversations/{id}/summaries"))
}

/// POST /api/v1/conversations - Create a conversation (201).
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationBody>,
) -> Result<(StatusCode, Json<ApiResponse<Conversation>>), AppError> {
    let meta = RequestMeta::start();

    let id = body
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    validate_conversation_id(&id)?;

    let user_id = body
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER_ID.to_string());

    let mut conversation = Conversation::new(&id, user_id);
    if let Some(title) = body.title.filter(|t| !t.trim().is_empty()) {
        conversation = conversation.with_title(title.trim());
    }

    let created = state.repo.create_conversation(&conversation).await?;
    tracing::info!(conversation_id = %created.id, user_id = %created.user_id, "Conversation created");

    Ok((StatusCode::CREATED, Json(links(meta.respond(created), &id))))
}

/// GET /api/v1/conversations/{id} - Get a conversation.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ConversationView>>, AppError> {
    let meta = RequestMeta::start();

    let conversation = state
        .repo
        .get_conversation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation '{id}' not found")))?;
    let message_count = state.repo.count_messages(&id).await?;

    let view = ConversationView {
        conversation,
        message_count,
    };
    Ok(Json(links(meta.respond(view), &id)))
}

/// GET /api/v1/conversations/{id}/history - All messages, oldest first.
///
/// An unknown conversation yields an empty list.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let meta = RequestMeta::start();
    let messages = state.repo.get_messages(&id).await?;

    Ok(Json(
        meta.respond(messages)
            .with_link("self", &format!("/api/v1/conversations/{id}/history"))
            .with_link("conversation", &format!("/api/v1/conversations/{id}")),
    ))
}

/// GET /api/v1/conversations/{id}/summaries - All summaries, oldest first.
pub async fn get_summaries(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ConversationSummary>>>, AppError> {
    let meta = RequestMeta::start();
    let summaries = state.repo.list_summaries(&id).await?;

    Ok(Json(
        meta.respond(summaries)
            .with_link("self", &format!("/api/v1/conversations/{id}/summaries"))
            .with_link("conversation", &format!("/api/v1/conversations/{id}")),
    ))
}

/// DELETE /api/v1/conversations/{id} - Delete a conversation.
///
/// Cached replies for the conversation are dropped too, so a recreated id
/// starts fresh.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let meta = RequestMeta::start();

    state.repo.delete_conversation(&id).await?;
    state.cache.purge_conversation(&id);
    tracing::info!(conversation_id = %id, "Conversation deleted");

    Ok(Json(meta.respond(serde_json::json!({
        "deleted": true,
        "conversation_id": id,
    }))))
}
