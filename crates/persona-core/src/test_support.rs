//! In-memory repository and scripted LLM provider for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use persona_types::chat::{ChatMessage, Conversation, ConversationSummary, NewMessage};
use persona_types::error::RepositoryError;
use persona_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};

use crate::chat::repository::ConversationRepository;
use crate::llm::provider::{LlmEventStream, LlmProvider};

#[derive(Default)]
struct MemoryState {
    conversations: Vec<Conversation>,
    messages: Vec<ChatMessage>,
    summaries: Vec<ConversationSummary>,
    next_id: i64,
}

/// Vec-backed repository. `fail_reads` makes history reads error out.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    pub fail_reads: Arc<AtomicBool>,
    pub fail_ping: Arc<AtomicBool>,
}

impl MemoryRepository {
    fn reads_ok(&self) -> Result<(), RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("disk I/O error".to_string()))
        } else {
            Ok(())
        }
    }

    fn next_id(state: &mut MemoryState) -> i64 {
        state.next_id += 1;
        state.next_id
    }
}

impl ConversationRepository for MemoryRepository {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.conversations.iter().any(|c| c.id == conversation.id) {
            return Err(RepositoryError::Conflict(conversation.id.clone()));
        }
        state.conversations.push(conversation.clone());
        Ok(conversation.clone())
    }

    async fn get_or_create_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.conversations.iter().find(|c| c.id == conversation_id) {
            return Ok(existing.clone());
        }
        let conversation = Conversation::new(conversation_id, user_id);
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let before = state.conversations.len();
        state.conversations.retain(|c| c.id != conversation_id);
        if state.conversations.len() == before {
            return Err(RepositoryError::NotFound);
        }
        state.messages.retain(|m| m.conversation_id != conversation_id);
        state.summaries.retain(|s| s.conversation_id != conversation_id);
        Ok(())
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state
            .conversations
            .iter()
            .any(|c| c.id == message.conversation_id)
        {
            return Err(RepositoryError::Query("FOREIGN KEY constraint failed".to_string()));
        }
        let id = Self::next_id(&mut state);
        let stored = ChatMessage {
            id,
            conversation_id: message.conversation_id.clone(),
            role: message.role,
            content: message.content.clone(),
            token_count: message.token_count,
            created_at: message.created_at,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.reads_ok()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let all = self.get_messages(conversation_id).await?;
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<u32, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as u32)
    }

    async fn save_summary(
        &self,
        conversation_id: &str,
        summary_text: &str,
        message_count: u32,
    ) -> Result<ConversationSummary, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state);
        let summary = ConversationSummary {
            id,
            conversation_id: conversation_id.to_string(),
            summary_text: summary_text.to_string(),
            message_count,
            created_at: Utc::now(),
        };
        state.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn get_latest_summary(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        Ok(self.list_summaries(conversation_id).await?.pop())
    }

    async fn list_summaries(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        self.reads_ok()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .summaries
            .iter()
            .filter(|s| s.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.lock().unwrap().conversations.len() as u64)
    }

    async fn count_all_messages(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.lock().unwrap().messages.len() as u64)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            Err(RepositoryError::Connection)
        } else {
            Ok(())
        }
    }
}

/// How the scripted provider answers chat turns. Summary requests are always
/// answered immediately.
#[derive(Clone)]
pub enum Script {
    /// Reply with `"echo: <last user message>"`, streamed word by word.
    Echo,
    /// Every call fails.
    Fail,
    /// Sleep this long before answering.
    Slow(Duration),
    /// Stream one delta, then fail.
    BreakMidStream,
}

/// LLM provider that follows a [`Script`] and records every request.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    capabilities: ProviderCapabilities,
    pub calls: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 8192,
                max_output_tokens: 1000,
            },
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Switch behavior for subsequent calls, on every clone.
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    fn current(&self) -> Script {
        self.script.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, request: &CompletionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
    }

    fn last_content(request: &CompletionRequest) -> &str {
        request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    fn is_summary(request: &CompletionRequest) -> bool {
        Self::last_content(request).starts_with("Please provide a concise summary")
    }

    fn answer(request: &CompletionRequest) -> String {
        if Self::is_summary(request) {
            "summary of the conversation".to_string()
        } else {
            format!("echo: {}", Self::last_content(request))
        }
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "test-model"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.record(request);
        if Self::is_summary(request) {
            return Ok(response(Self::answer(request)));
        }
        match self.current() {
            Script::Fail | Script::BreakMidStream => Err(LlmError::Provider {
                message: "upstream exploded".to_string(),
            }),
            Script::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(response(Self::answer(request)))
            }
            Script::Echo => Ok(response(Self::answer(request))),
        }
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        self.record(&request);
        let script = self.current();
        let answer = Self::answer(&request);

        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            match script {
                Script::Fail => {
                    yield Err(LlmError::Stream("connection reset".to_string()));
                }
                Script::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    yield Ok(StreamEvent::TextDelta { text: answer });
                    yield Ok(StreamEvent::Done);
                }
                Script::BreakMidStream => {
                    yield Ok(StreamEvent::TextDelta { text: "partial".to_string() });
                    yield Err(LlmError::Stream("connection reset".to_string()));
                }
                Script::Echo => {
                    let mut first = true;
                    for word in answer.split(' ') {
                        let text = if first { word.to_string() } else { format!(" {word}") };
                        first = false;
                        yield Ok(StreamEvent::TextDelta { text });
                    }
                    yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
                    yield Ok(StreamEvent::Done);
                }
            }
        })
    }
}

fn response(content: String) -> CompletionResponse {
    CompletionResponse {
        id: "resp-1".to_string(),
        content,
        model: "test-model".to_string(),
        stop_reason: StopReason::EndTurn,
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}
