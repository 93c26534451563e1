//! Chat engine for the persona chat backend.
//!
//! `ChatEngine` runs one chat turn end to end: validate, assemble context,
//! persist the user message, consult the response cache, call the LLM under a
//! timeout, and persist the reply. After each append the engine summarizes if
//! the conversation owes a summary. The blocking and streaming variants share every step
//! except the LLM call itself.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::{Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

use persona_types::chat::{
    ANONYMOUS_USER_ID, ChatMessage, ChatReply, ChatRequest, ConversationPhase, MessageRole,
    NewMessage,
};
use persona_types::config::LlmSettings;
use persona_types::error::{ChatError, RepositoryError};
use persona_types::llm::{CompletionRequest, LlmError, StreamEvent};

use crate::cache::{self, ResponseCache};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmEventStream;
use crate::metrics::PerformanceMonitor;
use crate::persona::Persona;

use super::context::{ContextManager, PreparedContext, estimate_tokens};
use super::phase::classify_contents;
use super::repository::ConversationRepository;
use super::summarizer::ConversationSummarizer;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Longest accepted conversation id, in characters.
pub const MAX_CONVERSATION_ID_CHARS: usize = 128;

/// Generation settings applied to every chat turn.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub llm_timeout: Duration,
}

impl From<&LlmSettings> for EngineConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            llm_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// One event of a streamed chat reply.
#[derive(Debug, Clone)]
pub enum ChatStreamEvent {
    /// A chunk of reply text, in order.
    Delta(String),
    /// The reply was persisted; carries the same payload as a blocking reply.
    Completed(ChatReply),
}

/// Stream returned by [`ChatEngine::send_stream`].
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, ChatError>> + Send>>;

/// Reject malformed requests before any side effect.
pub fn validate_request(request: &ChatRequest) -> Result<(), ChatError> {
    let conversation_id = request.conversation_id.trim();
    if conversation_id.is_empty() {
        return Err(ChatError::Validation(
            "conversation_id must not be empty".to_string(),
        ));
    }
    if conversation_id.chars().count() > MAX_CONVERSATION_ID_CHARS {
        return Err(ChatError::Validation(format!(
            "conversation_id must be at most {MAX_CONVERSATION_ID_CHARS} characters"
        )));
    }

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ChatError::Validation("message must not be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::Validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

/// Runs chat turns. Clones share all state.
pub struct ChatEngine<R: ConversationRepository> {
    inner: Arc<EngineInner<R>>,
}

impl<R: ConversationRepository> Clone for ChatEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<R> {
    repo: R,
    provider: BoxLlmProvider,
    persona: Arc<Persona>,
    cache: Arc<ResponseCache>,
    metrics: Arc<PerformanceMonitor>,
    context: ContextManager,
    config: EngineConfig,
    /// Held while a due summary is produced.
    summary_lock: Mutex<()>,
}

/// State carried from the pre-generation steps to the post-generation steps.
struct Turn {
    conversation_id: String,
    message: String,
    prepared: PreparedContext,
    cache_key: String,
    cached: Option<String>,
    summary_created: bool,
}

impl<R: ConversationRepository + 'static> ChatEngine<R> {
    pub fn new(
        repo: R,
        provider: BoxLlmProvider,
        persona: Arc<Persona>,
        cache: Arc<ResponseCache>,
        metrics: Arc<PerformanceMonitor>,
        context: ContextManager,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                repo,
                provider,
                persona,
                cache,
                metrics,
                context,
                config,
                summary_lock: Mutex::new(()),
            }),
        }
    }

    pub fn model(&self) -> &str {
        &self.inner.config.model
    }

    pub fn provider_name(&self) -> &str {
        self.inner.provider.name()
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.inner.cache
    }

    /// Run one chat turn and return the complete reply.
    pub async fn send(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let guard = self.inner.metrics.start();
        let result = self.run(request).await;
        if let Err(e) = &result {
            warn!(error = %e, "Chat turn failed");
        }
        guard.finish(result.is_ok());
        result
    }

    async fn run(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let inner = &self.inner;
        let turn = inner.begin(request).await?;

        let (response, cached) = match turn.cached.clone() {
            Some(hit) => (hit, true),
            None => (inner.generate(&turn).await?, false),
        };

        inner.finish(turn, response, cached).await
    }

    /// Run one chat turn as a stream of text deltas followed by the reply.
    ///
    /// Validation and the pre-generation steps run before this returns, so
    /// malformed requests fail here rather than inside the stream. Dropping
    /// the stream before `Completed` persists no assistant message.
    pub async fn send_stream(&self, request: ChatRequest) -> Result<ChatEventStream, ChatError> {
        let started = Instant::now();
        let turn = match self.inner.begin(request).await {
            Ok(turn) => turn,
            Err(e) => {
                self.inner.metrics.record(started.elapsed(), false);
                return Err(e);
            }
        };

        let inner = Arc::clone(&self.inner);
        let guard = inner.metrics.start();

        let stream = async_stream::try_stream! {
            if let Some(hit) = turn.cached.clone() {
                yield ChatStreamEvent::Delta(hit.clone());
                let reply = inner.finish(turn, hit, true).await?;
                guard.finish(true);
                yield ChatStreamEvent::Completed(reply);
            } else {
                let timeout = inner.config.llm_timeout;
                let mut events = inner.open_stream(&turn);
                let mut text = String::new();

                loop {
                    let next = tokio::time::timeout(timeout, events.next())
                        .await
                        .map_err(|_| ChatError::Generation(LlmError::Timeout(timeout.as_millis() as u64)))?;

                    match next {
                        None | Some(Ok(StreamEvent::Done)) => break,
                        Some(Ok(StreamEvent::TextDelta { text: delta })) => {
                            text.push_str(&delta);
                            yield ChatStreamEvent::Delta(delta);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(conversation_id = %turn.conversation_id, error = %e, "LLM stream failed");
                            Err::<(), _>(ChatError::Generation(e))?;
                        }
                    }
                }

                if text.trim().is_empty() {
                    Err::<(), _>(ChatError::Generation(LlmError::Deserialization(
                        "LLM returned an empty response".to_string(),
                    )))?;
                }

                let reply = inner.finish(turn, text, false).await?;
                guard.finish(true);
                yield ChatStreamEvent::Completed(reply);
            }
        };

        Ok(Box::pin(stream))
    }
}

impl<R: ConversationRepository> EngineInner<R> {
    /// Validate, resolve the conversation, build context, persist the user
    /// message, run a due summary, and consult the cache.
    async fn begin(&self, request: ChatRequest) -> Result<Turn, ChatError> {
        validate_request(&request)?;

        let conversation_id = request.conversation_id.trim().to_string();
        let message = request.message.trim().to_string();
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS_USER_ID);

        if let Err(e) = self
            .repo
            .get_or_create_conversation(&conversation_id, user_id)
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to resolve conversation");
        }

        let persona = self.persona.current().await;
        let prepared = self
            .context
            .prepare(&self.repo, &conversation_id, &persona, &message)
            .await;

        self.persist(&conversation_id, MessageRole::User, &message).await?;
        let summary_created = self.summarize_if_due(&conversation_id).await;

        let cache_key = cache::fingerprint(&conversation_id, &message);
        let cached = self.cache.get(&cache_key);
        if cached.is_some() {
            debug!(conversation_id = %conversation_id, "Response cache hit");
        }

        Ok(Turn {
            conversation_id,
            message,
            prepared,
            cache_key,
            cached,
            summary_created,
        })
    }

    fn request(&self, turn: &Turn, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: turn.prepared.messages.clone(),
            system: Some(turn.prepared.system_prompt.clone()),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            stream,
        }
    }

    fn span(&self, turn: &Turn, stream: bool) -> tracing::Span {
        info_span!(
            "gen_ai.chat",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %self.config.model,
            gen_ai.request.max_tokens = self.config.max_tokens,
            gen_ai.request.temperature = self.config.temperature,
            gen_ai.request.stream = stream,
            conversation_id = %turn.conversation_id,
        )
    }

    /// Blocking LLM call bounded by the configured timeout.
    async fn generate(&self, turn: &Turn) -> Result<String, ChatError> {
        let request = self.request(turn, false);
        let timeout = self.config.llm_timeout;

        let response = tokio::time::timeout(
            timeout,
            self.provider
                .complete(&request)
                .instrument(self.span(turn, false)),
        )
        .await
        .map_err(|_| LlmError::Timeout(timeout.as_millis() as u64))??;

        if response.content.trim().is_empty() {
            return Err(LlmError::Deserialization("LLM returned an empty response".to_string()).into());
        }

        debug!(
            conversation_id = %turn.conversation_id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = %response.stop_reason,
            "LLM response received"
        );
        Ok(response.content)
    }

    fn open_stream(&self, turn: &Turn) -> StreamInSpan {
        let request = self.request(turn, true);
        StreamInSpan {
            inner: self.provider.stream(request),
            span: self.span(turn, true),
        }
    }

    /// Persist the reply, update the cache, run a due summary, and build the
    /// caller-facing reply.
    async fn finish(&self, turn: Turn, response: String, cached: bool) -> Result<ChatReply, ChatError> {
        self.persist(&turn.conversation_id, MessageRole::Assistant, &response).await?;

        if !cached {
            self.cache
                .insert(turn.cache_key.clone(), &turn.conversation_id, response.clone());
        }

        let summarized_now = self.summarize_if_due(&turn.conversation_id).await;
        let summary_created = turn.summary_created || summarized_now;
        let message_count = self.repo.count_messages(&turn.conversation_id).await?;
        let phase = phase_of(&turn.prepared.history, &turn.message, &response);

        info!(
            conversation_id = %turn.conversation_id,
            cached,
            summary_created,
            message_count,
            phase = %phase,
            "Chat turn completed"
        );

        Ok(ChatReply {
            conversation_id: turn.conversation_id,
            response,
            cached,
            summary_created,
            message_count,
            phase,
            history_degraded: turn.prepared.history_degraded,
        })
    }

    async fn persist(&self, conversation_id: &str, role: MessageRole, content: &str) -> Result<(), ChatError> {
        let message = NewMessage::new(conversation_id, role, content)
            .with_token_count(estimate_tokens(content) as u32);
        self.repo.append_message(&message).await?;
        Ok(())
    }

    /// Compare stored messages against stored summaries.
    async fn summary_owed(&self, conversation_id: &str) -> Result<bool, RepositoryError> {
        let count = self.repo.count_messages(conversation_id).await?;
        if !self.context.summary_due(count, 0) {
            return Ok(false);
        }
        let stored = self.repo.list_summaries(conversation_id).await?.len();
        Ok(self.context.summary_due(count, stored))
    }

    /// Produce at most one summary if the conversation owes one.
    ///
    /// The check is repeated under `summary_lock` so concurrent turns on the
    /// same conversation do not both summarize the same stretch.
    async fn summarize_if_due(&self, conversation_id: &str) -> bool {
        match self.summary_owed(conversation_id).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Summary check failed");
                return false;
            }
        }

        let _held = self.summary_lock.lock().await;
        match self.summary_owed(conversation_id).await {
            Ok(true) => self.summarize(conversation_id).await,
            Ok(false) => false,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Summary check failed");
                false
            }
        }
    }

    /// Summarize the latest stretch of the conversation. Failures are logged
    /// and reported as `false`.
    async fn summarize(&self, conversation_id: &str) -> bool {
        let interval = self.context.config().summarize_interval as usize;

        let result = async {
            let messages: Vec<ChatMessage> = self
                .repo
                .get_messages(conversation_id)
                .await?
                .into_iter()
                .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
                .collect();
            let selected = ConversationSummarizer::select_for_summary(&messages, interval);

            let text = tokio::time::timeout(
                self.config.llm_timeout,
                ConversationSummarizer::summarize(&self.provider, selected, &self.config.model),
            )
            .await
            .map_err(|_| LlmError::Timeout(self.config.llm_timeout.as_millis() as u64))??;

            let count = self.repo.count_messages(conversation_id).await?;
            self.repo.save_summary(conversation_id, &text, count).await?;
            Ok::<u32, ChatError>(count)
        }
        .await;

        match result {
            Ok(count) => {
                info!(conversation_id = %conversation_id, message_count = count, "Conversation summarized");
                true
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Summary generation failed");
                false
            }
        }
    }
}

fn phase_of(history: &[ChatMessage], message: &str, response: &str) -> ConversationPhase {
    let mut contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    contents.push(message);
    contents.push(response);
    classify_contents(&contents)
}

/// Keeps the generation span entered while the LLM stream is polled.
struct StreamInSpan {
    inner: LlmEventStream,
    span: tracing::Span,
}

impl Stream for StreamInSpan {
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _enter = this.span.enter();
        this.inner.as_mut().poll_next(cx)
    }
}
