//! ConversationRepository trait definition.
//!
//! Provides create/append/read/delete operations for conversations, their
//! messages, and their summaries.

use persona_types::chat::{ChatMessage, Conversation, ConversationSummary, NewMessage};
use persona_types::error::RepositoryError;

/// Repository trait for conversation persistence.
///
/// Implementations live in persona-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ConversationRepository: Send + Sync {
    /// Insert a new conversation. Fails with `Conflict` if the id is taken.
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Return the conversation with this id, creating it for `user_id` if absent.
    fn get_or_create_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Delete a conversation with its messages and summaries.
    ///
    /// Returns `NotFound` if no conversation had this id.
    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a message and return it with its store-assigned id.
    fn append_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// All messages of a conversation in creation order.
    ///
    /// An unknown conversation yields an empty list.
    fn get_messages(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// The `limit` most recent messages, returned in creation order.
    fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Number of messages stored for a conversation.
    fn count_messages(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Append a summary and return it with its store-assigned id.
    fn save_summary(
        &self,
        conversation_id: &str,
        summary_text: &str,
        message_count: u32,
    ) -> impl std::future::Future<Output = Result<ConversationSummary, RepositoryError>> + Send;

    /// The most recent summary of a conversation.
    fn get_latest_summary(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSummary>, RepositoryError>> + Send;

    /// All summaries of a conversation, oldest first.
    fn list_summaries(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// Count conversations across all users.
    fn count_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count messages across all conversations.
    fn count_all_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Run a trivial query to prove the store is reachable.
    fn ping(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
