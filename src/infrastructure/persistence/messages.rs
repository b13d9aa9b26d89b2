use crate::domain::entities::{ConversationMessage, NewMessage, PageRequest};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::message_repository::MessageRepository;
use crate::infrastructure::persistence::{get_optional, Database};
use crate::shared::utils::now_rfc3339;
use async_trait::async_trait;
use sqlx::{any::AnyRow, AnyConnection, Row};

const MESSAGE_COLUMNS: &str = "rowid AS seq, id, conversation_id, agent_id, author, content, created_at";

pub(super) fn message_from_row(row: &AnyRow) -> Result<ConversationMessage, sqlx::Error> {
    Ok(ConversationMessage {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        agent_id: get_optional(row, "agent_id")?,
        by: row.try_get("author")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        seq: row.try_get("seq")?,
    })
}

/// Inserts a message on an open connection or transaction and reads it back
/// with its insertion sequence. The conversation must exist and not be
/// soft-deleted.
pub(super) async fn insert_message(
    conn: &mut AnyConnection,
    message: &NewMessage,
) -> DomainResult<ConversationMessage> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = now_rfc3339();

    let result = sqlx::query(
        "INSERT INTO conversation_messages (id, conversation_id, agent_id, author, content, created_at)
         SELECT ?, id, ?, ?, ?, ? FROM conversations WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&id)
    .bind(&message.agent_id)
    .bind(message.by.as_str())
    .bind(&message.content)
    .bind(&created_at)
    .bind(&message.conversation_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::NotFound(format!(
            "Conversation {} not found",
            message.conversation_id
        )));
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM conversation_messages WHERE id = ?",
        MESSAGE_COLUMNS
    ))
    .bind(&id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(message_from_row(&row)?)
}

#[async_trait]
impl MessageRepository for Database {
    async fn add_message(&self, message: &NewMessage) -> DomainResult<ConversationMessage> {
        let mut conn = self.pool.acquire().await?;
        insert_message(&mut conn, message).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> DomainResult<(Vec<ConversationMessage>, i64)> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversation_messages
             WHERE conversation_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM conversation_messages WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("count")?;

        Ok((messages, total))
    }

    async fn get_all_messages(&self, conversation_id: &str) -> DomainResult<Vec<ConversationMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversation_messages
             WHERE conversation_id = ?
             ORDER BY created_at ASC, rowid ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }
}
