//! Prompt assembly for a single chat turn.
//!
//! `ContextManager` turns the persona, the latest conversation summary, and a
//! bounded window of recent messages into the system prompt plus ordered
//! message list sent to the LLM. It also decides when a summary is due.

use tracing::{debug, warn};

use persona_types::chat::{ChatMessage, ConversationSummary, MessageRole};
use persona_types::config::ContextSettings;
use persona_types::llm::Message;

use super::repository::ConversationRepository;

/// Fixed per-message overhead added by the token estimate.
const TOKENS_PER_MESSAGE: usize = 4;

const INSTRUCTIONS: &str = "Respond in character according to the persona above. \
Maintain consistency with the conversation history and summary if provided.";

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Build the system prompt from the persona and an optional summary.
pub fn build_system_prompt(persona: &str, summary: Option<&str>) -> String {
    let mut prompt = format!("PERSONA:\n{persona}\n\n");
    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("CONVERSATION SUMMARY:\n{summary}\n\n"));
    }
    prompt.push_str("INSTRUCTIONS:\n");
    prompt.push_str(INSTRUCTIONS);
    prompt
}

/// Window and summarization settings.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub recent_messages: usize,
    pub max_context_tokens: usize,
    pub summarize_interval: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::from(&ContextSettings::default())
    }
}

impl From<&ContextSettings> for ContextConfig {
    fn from(settings: &ContextSettings) -> Self {
        Self {
            recent_messages: settings.recent_messages,
            max_context_tokens: settings.max_context_tokens,
            summarize_interval: settings.summarize_interval,
        }
    }
}

/// Everything the engine needs to issue one LLM call.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    pub system_prompt: String,
    /// Replayed history followed by the new user message.
    pub messages: Vec<Message>,
    /// Recent stored messages the window was cut from, oldest first.
    pub history: Vec<ChatMessage>,
    pub summary: Option<ConversationSummary>,
    /// True when history could not be read and the prompt carries none.
    pub history_degraded: bool,
}

/// Builds prompts and tracks the summary cadence.
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Whether a conversation holding `message_count` messages and
    /// `summaries_stored` summaries owes another summary.
    ///
    /// One summary is owed per full interval, so a boundary passed by a turn
    /// that never finished is picked up by the next turn.
    pub fn summary_due(&self, message_count: u32, summaries_stored: usize) -> bool {
        let interval = self.config.summarize_interval;
        interval > 0 && (message_count / interval) as usize > summaries_stored
    }

    /// Assemble the prompt for `user_message` from stored history.
    ///
    /// Read failures never fail the turn: the prompt falls back to persona
    /// plus the new message and `history_degraded` is set.
    pub async fn prepare<R: ConversationRepository>(
        &self,
        repo: &R,
        conversation_id: &str,
        persona: &str,
        user_message: &str,
    ) -> PreparedContext {
        let loaded = async {
            let history = repo
                .get_recent_messages(conversation_id, self.config.recent_messages)
                .await?;
            let summary = repo.get_latest_summary(conversation_id).await?;
            Ok::<_, persona_types::error::RepositoryError>((history, summary))
        }
        .await;

        let (history, summary, history_degraded) = match loaded {
            Ok((history, summary)) => (history, summary, false),
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Conversation history unavailable, continuing without it"
                );
                (Vec::new(), None, true)
            }
        };

        let system_prompt =
            build_system_prompt(persona, summary.as_ref().map(|s| s.summary_text.as_str()));

        let mut messages = self.trim_history(&system_prompt, &history, user_message);
        messages.push(Message::user(user_message));

        debug!(
            conversation_id = %conversation_id,
            stored = history.len(),
            replayed = messages.len() - 1,
            has_summary = summary.is_some(),
            "Context prepared"
        );

        PreparedContext {
            system_prompt,
            messages,
            history,
            summary,
            history_degraded,
        }
    }

    /// Replayable history, oldest first, dropping the oldest messages while
    /// the estimate exceeds the token budget. The new message always counts
    /// against the budget but is never dropped.
    pub fn trim_history(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Vec<Message> {
        let replayable: Vec<Message> = history
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .map(|m| Message {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        let start = replayable.len().saturating_sub(self.config.recent_messages);
        let window = &replayable[start..];

        let cost = |text: &str| estimate_tokens(text) + TOKENS_PER_MESSAGE;
        let fixed = estimate_tokens(system_prompt) + cost(user_message);
        let mut total: usize = fixed + window.iter().map(|m| cost(&m.content)).sum::<usize>();

        let mut skip = 0;
        while total > self.config.max_context_tokens && skip < window.len() {
            total -= cost(&window[skip].content);
            skip += 1;
        }

        window[skip..].to_vec()
    }
}
