//! Chat endpoints.
//!
//! - POST /api/v1/chat         - One turn, full reply in the envelope
//! - POST /api/v1/chat/stream  - One turn as Server-Sent Events
//!
//! SSE event types:
//! - `conversation` - initial event with `{ "conversation_id": "..." }`
//! - `text_delta`   - incremental text: `{ "text": "..." }`
//! - `done`         - the final reply (same shape as the non-streaming data)
//! - `error`        - generation failed: `{ "message": "..." }`

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::Stream;

use persona_core::chat::engine::ChatStreamEvent;
use persona_types::chat::{ChatReply, ChatRequest};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestMeta};
use crate::state::AppState;

/// Request body shared by both chat endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Conversation to continue; a new id is minted when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatBody {
    fn into_request(self) -> ChatRequest {
        let conversation_id = self
            .conversation_id
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        ChatRequest {
            conversation_id,
            message: self.message,
            user_id: self.user_id,
        }
    }
}

/// POST /api/v1/chat - Run one chat turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ApiResponse<ChatReply>>, AppError> {
    let meta = RequestMeta::start();
    let engine = state.engine()?;

    let reply = engine.send(body.into_request()).await?;
    let history = format!("/api/v1/conversations/{}/history", reply.conversation_id);

    Ok(Json(meta.respond(reply).with_link("history", &history)))
}

/// POST /api/v1/chat/stream - Run one chat turn as SSE.
///
/// Validation and engine availability are checked before the stream opens,
/// so those failures are ordinary envelope errors. Once streaming, a failure
/// becomes an `error` event and no assistant message is stored.
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let engine = state.engine()?.clone();
    let request = body.into_request();
    let conversation_id = request.conversation_id.clone();

    let mut events = engine.send_stream(request).await?;

    let sse_stream = async_stream::stream! {
        let data = serde_json::json!({ "conversation_id": conversation_id });
        yield Ok::<_, Infallible>(Event::default().event("conversation").data(data.to_string()));

        while let Some(event) = events.next().await {
            match event {
                Ok(ChatStreamEvent::Delta(text)) => {
                    let data = serde_json::json!({ "text": text });
                    yield Ok(Event::default().event("text_delta").data(data.to_string()));
                }
                Ok(ChatStreamEvent::Completed(reply)) => {
                    let data = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
                    yield Ok(Event::default().event("done").data(data));
                }
                Err(e) => {
                    let data = serde_json::json!({ "message": e.to_string() });
                    yield Ok(Event::default().event("error").data(data.to_string()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_without_conversation_id_gets_one() {
        let body: ChatBody = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        let request = body.into_request();
        assert!(!request.conversation_id.is_empty());
        assert_eq!(request.message, "hello");
        assert!(request.user_id.is_none());
    }

    #[test]
    fn test_body_keeps_given_ids() {
        let body: ChatBody = serde_json::from_str(
            r#"{"conversation_id":"c-9","message":"hi","user_id":"alice"}"#,
        )
        .unwrap();
        let request = body.into_request();
        assert_eq!(request.conversation_id, "c-9");
        assert_eq!(request.user_id.as_deref(), Some("alice"));
    }
}
