//! Conversation, message, and summary types for the persona chat backend.
//!
//! These types model persisted conversations between a user and the persona:
//! conversations, their messages, and the periodic summaries that bound prompt
//! size for long conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// Title given to conversations created without an explicit one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// User id recorded when a chat request does not name its user.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// A conversation owned by a single user.
///
/// The id is caller-supplied and unique; messages and summaries are removed
/// together with their conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a new conversation stamped with the current time.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the default title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// A message that has not been written yet.
///
/// The store assigns the integer id that orders messages sharing a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub token_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(conversation_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            token_count: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_token_count(mut self, token_count: u32) -> Self {
        self.token_count = Some(token_count);
        self
    }
}

/// A persisted message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Estimated token count, when known at write time.
    pub token_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// A condensed synopsis of earlier turns in a conversation.
///
/// Summaries are append-only; the latest one is fed back into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub conversation_id: String,
    pub summary_text: String,
    /// Conversation message count at the moment the summary was produced.
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Best-effort label of where a conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Greeting,
    InformationGathering,
    ProblemSolving,
    CasualChat,
    WrapUp,
    Archived,
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationPhase::Greeting => write!(f, "greeting"),
            ConversationPhase::InformationGathering => write!(f, "information_gathering"),
            ConversationPhase::ProblemSolving => write!(f, "problem_solving"),
            ConversationPhase::CasualChat => write!(f, "casual_chat"),
            ConversationPhase::WrapUp => write!(f, "wrap_up"),
            ConversationPhase::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for ConversationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greeting" => Ok(ConversationPhase::Greeting),
            "information_gathering" => Ok(ConversationPhase::InformationGathering),
            "problem_solving" => Ok(ConversationPhase::ProblemSolving),
            "casual_chat" => Ok(ConversationPhase::CasualChat),
            "wrap_up" => Ok(ConversationPhase::WrapUp),
            "archived" => Ok(ConversationPhase::Archived),
            other => Err(format!("invalid conversation phase: '{other}'")),
        }
    }
}

/// An incoming chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message: message.into(),
            user_id: None,
        }
    }
}

/// The outcome of one completed chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub response: String,
    /// True when the response came from the response cache.
    pub cached: bool,
    /// True when a new summary was written during this turn.
    pub summary_created: bool,
    /// Messages stored for the conversation after this turn.
    pub message_count: u32,
    pub phase: ConversationPhase,
    /// True when history could not be read and the prompt carried none.
    pub history_degraded: bool,
}
