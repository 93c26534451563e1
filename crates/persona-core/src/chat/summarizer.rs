//! Conversation summarizer.
//!
//! `ConversationSummarizer` condenses the most recent stretch of a
//! conversation into a short summary that later prompts carry in place of
//! the full history.

use persona_types::chat::{ChatMessage, MessageRole};
use persona_types::llm::{CompletionRequest, LlmError, Message};

use crate::llm::box_provider::BoxLlmProvider;

const SUMMARY_MAX_TOKENS: u32 = 500;
const SUMMARY_TEMPERATURE: f64 = 0.3;

/// Returned when there is nothing to condense.
pub const EMPTY_SUMMARY: &str = "No messages to summarize.";

/// Stateless helper around one non-streaming summary call.
pub struct ConversationSummarizer;

impl ConversationSummarizer {
    /// Summarize `messages` (oldest first). Only user and assistant turns are
    /// included in the transcript.
    #[tracing::instrument(
        name = "summarize_conversation",
        skip(provider, messages),
        fields(model = %model, message_count = messages.len())
    )]
    pub async fn summarize(
        provider: &BoxLlmProvider,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<String, LlmError> {
        let transcript = Self::transcript(messages);
        if transcript.is_empty() {
            return Ok(EMPTY_SUMMARY.to_string());
        }

        let request = CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(Self::prompt(&transcript))],
            system: None,
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: Some(SUMMARY_TEMPERATURE),
            stream: false,
        };

        let response = provider.complete(&request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Err(LlmError::Deserialization(
                "summary response was empty".to_string(),
            ));
        }
        Ok(text.to_string())
    }

    /// The last `window` user/assistant messages, oldest first.
    pub fn select_for_summary(messages: &[ChatMessage], window: usize) -> &[ChatMessage] {
        let start = messages.len().saturating_sub(window);
        &messages[start..]
    }

    fn transcript(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn prompt(transcript: &str) -> String {
        format!(
            "Please provide a concise summary of this conversation that captures:\n\
             1. Key topics discussed\n\
             2. Important decisions or conclusions\n\
             3. User's preferences or specific requests\n\
             4. Emotional tone and relationship dynamics\n\n\
             Conversation:\n{transcript}\n\nSummary:"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: 0,
            conversation_id: "c".to_string(),
            role,
            content: content.to_string(),
            token_count: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_for_summary_takes_tail() {
        let messages: Vec<ChatMessage> = (0..5)
            .map(|i| msg(MessageRole::User, &i.to_string()))
            .collect();
        let selected = ConversationSummarizer::select_for_summary(&messages, 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].content, "3");

        assert_eq!(ConversationSummarizer::select_for_summary(&messages, 10).len(), 5);
    }

    #[test]
    fn test_transcript_skips_system_messages() {
        let messages = vec![
            msg(MessageRole::System, "hidden"),
            msg(MessageRole::User, "What is a nebula?"),
            msg(MessageRole::Assistant, "A cloud of gas and dust."),
        ];
        let transcript = ConversationSummarizer::transcript(&messages);
        assert_eq!(
            transcript,
            "user: What is a nebula?\nassistant: A cloud of gas and dust."
        );
    }

    #[test]
    fn test_prompt_embeds_transcript() {
        let prompt = ConversationSummarizer::prompt("user: hi");
        assert!(prompt.contains("Conversation:\nuser: hi\n\nSummary:"));
        assert!(prompt.starts_with("Please provide a concise summary"));
    }
}
