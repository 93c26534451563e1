//! LlmProvider trait definition.
//!
//! Uses RPITIT for `complete` and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use persona_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// Boxed event stream returned by [`LlmProvider::stream`].
pub type LlmEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// A hosted chat-completion backend.
///
/// Implementations live in persona-infra (e.g., `OpenAiCompatibleProvider`).
/// Every failure mode (rate limit, auth, malformed body, broken stream) is an
/// [`LlmError`]; the engine folds them all into one generation failure.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Model used when a request leaves `model` empty.
    fn default_model(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request.
    ///
    /// The stream ends with [`StreamEvent::Done`] on success; an `Err` item
    /// means the generation was cut short.
    fn stream(&self, request: CompletionRequest) -> LlmEventStream;
}
