//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use persona_types::error::{ChatError, PersonaError, RepositoryError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Chat(ChatError),
    Repository(RepositoryError),
    Persona(PersonaError),
    /// No API key was configured, so there is no engine to answer.
    EngineUnavailable,
    NotFound(String),
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl From<PersonaError> for AppError {
    fn from(e: PersonaError) -> Self {
        AppError::Persona(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::Generation(_)) => {
                (StatusCode::BAD_GATEWAY, "GENERATION_FAILED", e.to_string())
            }
            AppError::Chat(e @ ChatError::Configuration(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CONFIGURATION_ERROR", e.to_string())
            }
            AppError::Chat(e @ ChatError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", e.to_string())
            }
            AppError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Conversation not found".to_string())
            }
            AppError::Repository(RepositoryError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::Repository(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", e.to_string())
            }
            AppError::Persona(PersonaError::InvalidContent(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Persona(e @ PersonaError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "PERSONA_NOT_FOUND", e.to_string())
            }
            AppError::Persona(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSONA_ERROR", e.to_string())
            }
            AppError::EngineUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ENGINE_UNAVAILABLE",
                "Chat engine is not configured (missing API key)".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "Request failed");
        }
        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_types::llm::LlmError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Chat(ChatError::Validation("empty".into())), StatusCode::BAD_REQUEST),
            (
                AppError::Chat(ChatError::Generation(LlmError::Timeout(10))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Chat(ChatError::Persistence(RepositoryError::Connection)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Repository(RepositoryError::NotFound), StatusCode::NOT_FOUND),
            (
                AppError::Repository(RepositoryError::Conflict("taken".into())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Persona(PersonaError::InvalidContent("short".into())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::EngineUnavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::EngineUnavailable.parts().1, "ENGINE_UNAVAILABLE");
        assert_eq!(
            AppError::Chat(ChatError::Generation(LlmError::AuthenticationFailed)).parts().1,
            "GENERATION_FAILED"
        );
    }
}
