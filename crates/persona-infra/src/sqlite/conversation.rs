//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `persona-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, reads on the
//! reader pool and writes on the single-connection writer.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use persona_core::chat::repository::ConversationRepository;
use persona_types::chat::{ChatMessage, Conversation, ConversationSummary, MessageRole, NewMessage};
use persona_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    user_id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: i64,
    conversation_id: String,
    role: String,
    content: String,
    token_count: Option<i64>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            token_count: row.try_get("token_count")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            role,
            content: self.content,
            token_count: self.token_count.map(|v| v as u32),
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct SummaryRow {
    id: i64,
    conversation_id: String,
    summary_text: String,
    message_count: i64,
    created_at: String,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            summary_text: row.try_get("summary_text")?,
            message_count: row.try_get("message_count")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_summary(self) -> Result<ConversationSummary, RepositoryError> {
        Ok(ConversationSummary {
            id: self.id,
            conversation_id: self.conversation_id,
            summary_text: self.summary_text,
            message_count: self.message_count as u32,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps so text order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn map_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row = MessageRow::from_row(row).map_err(query_err)?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

fn map_summaries(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<ConversationSummary>, RepositoryError> {
    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let summary_row = SummaryRow::from_row(row).map_err(query_err)?;
        summaries.push(summary_row.into_summary()?);
    }
    Ok(summaries)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (id, user_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.title)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "conversation '{}' already exists",
                        conversation.id
                    ));
                }
            }
            query_err(e)
        })?;

        Ok(conversation.clone())
    }

    async fn get_or_create_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation, RepositoryError> {
        let fresh = Conversation::new(conversation_id, user_id);

        // INSERT OR IGNORE keeps concurrent first messages from racing.
        sqlx::query(
            r#"INSERT OR IGNORE INTO conversations (id, user_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&fresh.id)
        .bind(&fresh.user_id)
        .bind(&fresh.title)
        .bind(format_datetime(&fresh.created_at))
        .bind(format_datetime(&fresh.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_err)?;

        ConversationRow::from_row(&row)
            .map_err(query_err)?
            .into_conversation()
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row).map_err(query_err)?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        // Messages and summaries go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let result = sqlx::query(
            r#"INSERT INTO messages (conversation_id, role, content, token_count, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&message.conversation_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.token_count.map(|v| v as i64))
        .bind(format_datetime(&message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("FOREIGN KEY") {
                    return RepositoryError::NotFound;
                }
            }
            query_err(e)
        })?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&message.created_at))
            .bind(&message.conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            conversation_id: message.conversation_id.clone(),
            role: message.role,
            content: message.content.clone(),
            token_count: message.token_count,
            created_at: message.created_at,
        })
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        map_messages(&rows)
    }

    async fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM messages WHERE conversation_id = ?
                   ORDER BY created_at DESC, id DESC LIMIT ?
               ) ORDER BY created_at ASC, id ASC"#,
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        map_messages(&rows)
    }

    async fn count_messages(&self, conversation_id: &str) -> Result<u32, RepositoryError> {
        // Writer pool: callers count right after appending.
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_err)?;

        let count: i64 = row.try_get("cnt").map_err(query_err)?;
        Ok(count as u32)
    }

    async fn save_summary(
        &self,
        conversation_id: &str,
        summary_text: &str,
        message_count: u32,
    ) -> Result<ConversationSummary, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO summaries (conversation_id, summary_text, message_count, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(conversation_id)
        .bind(summary_text)
        .bind(message_count as i64)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(ConversationSummary {
            id: result.last_insert_rowid(),
            conversation_id: conversation_id.to_string(),
            summary_text: summary_text.to_string(),
            message_count,
            created_at,
        })
    }

    async fn get_latest_summary(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM summaries WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let summary_row = SummaryRow::from_row(&row).map_err(query_err)?;
                Ok(Some(summary_row.into_summary()?))
            }
            None => Ok(None),
        }
    }

    async fn list_summaries(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM summaries WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        map_summaries(&rows)
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM conversations")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let count: i64 = row.try_get("cnt").map_err(query_err)?;
        Ok(count as u64)
    }

    async fn count_all_messages(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let count: i64 = row.try_get("cnt").map_err(query_err)?;
        Ok(count as u64)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool.reader)
            .await
            .map_err(|_| RepositoryError::Connection)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn repo() -> SqliteConversationRepository {
        SqliteConversationRepository::new(test_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_get_conversation() {
        let repo = repo().await;
        let conversation = Conversation::new("conv-1", "user-7").with_title("Stargazing");
        repo.create_conversation(&conversation).await.unwrap();

        let fetched = repo.get_conversation("conv-1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "user-7");
        assert_eq!(fetched.title, "Stargazing");
        assert!(repo.get_conversation("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let repo = repo().await;
        let conversation = Conversation::new("conv-1", "anonymous");
        repo.create_conversation(&conversation).await.unwrap();

        let err = repo.create_conversation(&conversation).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let repo = repo().await;
        let first = repo.get_or_create_conversation("conv-1", "alice").await.unwrap();
        let second = repo.get_or_create_conversation("conv-1", "bob").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.user_id, "alice");
        assert_eq!(repo.count_conversations().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_messages_keep_insertion_order() {
        let repo = repo().await;
        repo.get_or_create_conversation("conv-1", "anonymous").await.unwrap();

        // Identical timestamps fall back to id order.
        let at = Utc::now();
        for (i, role) in [MessageRole::User, MessageRole::Assistant, MessageRole::User]
            .into_iter()
            .enumerate()
        {
            let mut message = NewMessage::new("conv-1", role, format!("m{i}"));
            message.created_at = at;
            repo.append_message(&message).await.unwrap();
        }

        let messages = repo.get_messages("conv-1").await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages[0].id < messages[1].id);
    }

    #[tokio::test]
    async fn test_recent_messages_are_chronological_tail() {
        let repo = repo().await;
        repo.get_or_create_conversation("conv-1", "anonymous").await.unwrap();
        for i in 0..6 {
            repo.append_message(&NewMessage::new("conv-1", MessageRole::User, format!("m{i}")))
                .await
                .unwrap();
        }

        let recent = repo.get_recent_messages("conv-1", 3).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);

        let all = repo.get_recent_messages("conv-1", 100).await.unwrap();
        assert_eq!(all.len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_conversation_has_empty_history() {
        let repo = repo().await;
        assert!(repo.get_messages("nope").await.unwrap().is_empty());
        assert_eq!(repo.count_messages("nope").await.unwrap(), 0);
        assert!(repo.get_latest_summary("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_to_missing_conversation_fails() {
        let repo = repo().await;
        let err = repo
            .append_message(&NewMessage::new("ghost", MessageRole::User, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_append_bumps_updated_at() {
        let repo = repo().await;
        let created = repo.get_or_create_conversation("conv-1", "anonymous").await.unwrap();

        let mut message = NewMessage::new("conv-1", MessageRole::User, "hello");
        message.created_at = created.updated_at + chrono::Duration::seconds(30);
        repo.append_message(&message).await.unwrap();

        let updated = repo.get_conversation("conv-1").await.unwrap().unwrap();
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_summaries_latest_and_list() {
        let repo = repo().await;
        repo.get_or_create_conversation("conv-1", "anonymous").await.unwrap();

        repo.save_summary("conv-1", "first summary", 20).await.unwrap();
        repo.save_summary("conv-1", "second summary", 40).await.unwrap();

        let latest = repo.get_latest_summary("conv-1").await.unwrap().unwrap();
        assert_eq!(latest.summary_text, "second summary");
        assert_eq!(latest.message_count, 40);

        let all = repo.list_summaries("conv-1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].summary_text, "first summary");
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let repo = repo().await;
        repo.get_or_create_conversation("conv-1", "anonymous").await.unwrap();
        repo.get_or_create_conversation("conv-2", "anonymous").await.unwrap();
        repo.append_message(&NewMessage::new("conv-1", MessageRole::User, "bye"))
            .await
            .unwrap();
        repo.append_message(&NewMessage::new("conv-2", MessageRole::User, "stay"))
            .await
            .unwrap();
        repo.save_summary("conv-1", "gone soon", 1).await.unwrap();

        repo.delete_conversation("conv-1").await.unwrap();

        assert!(repo.get_conversation("conv-1").await.unwrap().is_none());
        assert!(repo.get_messages("conv-1").await.unwrap().is_empty());
        assert!(repo.list_summaries("conv-1").await.unwrap().is_empty());
        assert_eq!(repo.count_all_messages().await.unwrap(), 1);

        let err = repo.delete_conversation("conv-1").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_ping() {
        let repo = repo().await;
        repo.ping().await.unwrap();
    }
}
