use crate::domain::entities::{
    assignment_announcement, Conversation, ConversationStatus, CreateConversation, NewMessage,
    PageRequest,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::conversation_repository::{
    AssignmentCommit, ConversationRepository, FinishOutcome,
};
use crate::domain::services::{check_assignable, check_finishable, check_ratable, FinishDecision};
use crate::infrastructure::persistence::messages::insert_message;
use crate::infrastructure::persistence::{get_optional, Database};
use crate::shared::utils::now_rfc3339;
use async_trait::async_trait;
use sqlx::{any::AnyRow, AnyConnection, Row};

const CONVERSATION_COLUMNS: &str = "id, subject, consumer_id, agent_id, status, rate, \
     closing_reason, created_at, started_at, finished_at, deleted_at";

fn conversation_from_row(row: &AnyRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        consumer_id: row.try_get("consumer_id")?,
        agent_id: get_optional(row, "agent_id")?,
        status: row.try_get("status")?,
        rate: get_optional::<i64>(row, "rate")?.map(|r| r as u8),
        closing_reason: get_optional(row, "closing_reason")?,
        created_at: row.try_get("created_at")?,
        started_at: get_optional(row, "started_at")?,
        finished_at: get_optional(row, "finished_at")?,
        deleted_at: get_optional(row, "deleted_at")?,
    })
}

async fn fetch_conversation(
    conn: &mut AnyConnection,
    id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM conversations WHERE id = ? AND deleted_at IS NULL",
        CONVERSATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(conversation_from_row).transpose()
}

pub(super) async fn count_open_conversations(
    conn: &mut AnyConnection,
    agent_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query(
        "SELECT COUNT(*) AS count FROM conversations
         WHERE agent_id = ? AND status = 'open' AND deleted_at IS NULL",
    )
    .bind(agent_id)
    .fetch_one(&mut *conn)
    .await?
    .try_get("count")
}

/// The assignment primitive. Runs inside the caller's transaction.
///
/// The agent row is written first so the transaction holds the write lock
/// before any read; concurrent capacity checks for the same agent therefore
/// see each other's commits.
async fn assign_in(
    conn: &mut AnyConnection,
    conversation_id: &str,
    agent_id: &str,
    capacity: i64,
) -> DomainResult<AssignmentCommit> {
    let now = now_rfc3339();

    let touched = sqlx::query("UPDATE agents SET updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&now)
        .bind(agent_id)
        .execute(&mut *conn)
        .await?;

    if touched.rows_affected() == 0 {
        return Err(DomainError::NotFound(format!("Agent {} not found", agent_id)));
    }

    let conversation = fetch_conversation(&mut *conn, conversation_id)
        .await?
        .ok_or_else(|| {
            DomainError::NotFound(format!("Conversation {} not found", conversation_id))
        })?;

    check_assignable(&conversation)?;

    let open_count = count_open_conversations(&mut *conn, agent_id).await?;
    if open_count >= capacity {
        return Err(DomainError::CapacityExceeded(format!(
            "Agent {} already has {} open conversations (cap {})",
            agent_id, open_count, capacity
        )));
    }

    let updated = sqlx::query(
        "UPDATE conversations
         SET agent_id = ?, status = 'open', started_at = ?
         WHERE id = ? AND status = 'pending' AND agent_id IS NULL AND deleted_at IS NULL",
    )
    .bind(agent_id)
    .bind(&now)
    .bind(conversation_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(DomainError::Conflict(format!(
            "Conversation {} was assigned concurrently",
            conversation_id
        )));
    }

    let username: String = sqlx::query("SELECT username FROM agents WHERE id = ?")
        .bind(agent_id)
        .fetch_one(&mut *conn)
        .await?
        .try_get("username")?;

    let system_message = insert_message(
        &mut *conn,
        &NewMessage::system(
            conversation_id,
            Some(agent_id.to_string()),
            assignment_announcement(&username),
        ),
    )
    .await?;

    let conversation = Conversation {
        agent_id: Some(agent_id.to_string()),
        status: ConversationStatus::Open,
        started_at: Some(now),
        ..conversation
    };

    Ok(AssignmentCommit {
        conversation,
        system_message,
    })
}

#[async_trait]
impl ConversationRepository for Database {
    async fn create_conversation(
        &self,
        create: &CreateConversation,
        capacity: i64,
    ) -> DomainResult<(Conversation, Option<AssignmentCommit>)> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = now_rfc3339();

        let mut tx = self.pool.begin().await?;

        // Inserting through the consumer row checks existence with a write,
        // so the transaction never has to upgrade from a read lock.
        let inserted = sqlx::query(
            "INSERT INTO conversations (id, subject, consumer_id, status, created_at)
             SELECT ?, ?, id, 'pending', ? FROM consumers WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&id)
        .bind(&create.subject)
        .bind(&created_at)
        .bind(&create.consumer_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Consumer {} not found",
                create.consumer_id
            )));
        }

        let assignment = match &create.agent_id {
            Some(agent_id) => Some(assign_in(&mut tx, &id, agent_id, capacity).await?),
            None => None,
        };

        let conversation = match &assignment {
            Some(commit) => commit.conversation.clone(),
            None => fetch_conversation(&mut tx, &id)
                .await?
                .ok_or_else(|| DomainError::Internal("Inserted conversation vanished".to_string()))?,
        };

        tx.commit().await?;

        Ok((conversation, assignment))
    }

    async fn get_conversation_by_id(&self, id: &str) -> DomainResult<Option<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_conversation(&mut conn, id).await?)
    }

    async fn list_conversations(
        &self,
        page: PageRequest,
    ) -> DomainResult<(Vec<Conversation>, i64)> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations
             WHERE deleted_at IS NULL
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
            CONVERSATION_COLUMNS
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let conversations = rows
            .iter()
            .map(conversation_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM conversations WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?
                .try_get("count")?;

        Ok((conversations, total))
    }

    async fn list_agent_conversations(
        &self,
        agent_id: &str,
        status: Option<ConversationStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<Conversation>, i64)> {
        let status_clause = if status.is_some() { " AND status = ?" } else { "" };

        let list_sql = format!(
            "SELECT {} FROM conversations
             WHERE agent_id = ? AND deleted_at IS NULL{}
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
            CONVERSATION_COLUMNS, status_clause
        );
        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM conversations
             WHERE agent_id = ? AND deleted_at IS NULL{}",
            status_clause
        );

        let mut list_query = sqlx::query(&list_sql).bind(agent_id);
        let mut count_query = sqlx::query(&count_sql).bind(agent_id);
        if let Some(status) = status {
            list_query = list_query.bind(status.as_str());
            count_query = count_query.bind(status.as_str());
        }

        let rows = list_query
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let conversations = rows
            .iter()
            .map(conversation_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get("count")?;

        Ok((conversations, total))
    }

    async fn get_pending_queue(&self) -> DomainResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM conversations
             WHERE status = 'pending' AND agent_id IS NULL AND deleted_at IS NULL
             ORDER BY created_at ASC, rowid ASC",
            CONVERSATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let queue = rows
            .iter()
            .map(conversation_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(queue)
    }

    async fn count_pending_queue(&self) -> DomainResult<i64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM conversations
             WHERE status = 'pending' AND agent_id IS NULL AND deleted_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?
        .try_get("count")?;

        Ok(count)
    }

    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
        capacity: i64,
    ) -> DomainResult<AssignmentCommit> {
        let mut tx = self.pool.begin().await?;
        let commit = assign_in(&mut tx, conversation_id, agent_id, capacity).await?;
        tx.commit().await?;
        Ok(commit)
    }

    async fn finish_conversation(
        &self,
        conversation_id: &str,
        closing_reason: &str,
    ) -> DomainResult<FinishOutcome> {
        let finished_at = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE conversations
             SET status = 'closed', finished_at = ?, closing_reason = ?
             WHERE id = ? AND status = 'open' AND deleted_at IS NULL",
        )
        .bind(&finished_at)
        .bind(closing_reason)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        let conversation = fetch_conversation(&mut tx, conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        if updated.rows_affected() == 1 {
            tx.commit().await?;
            return Ok(FinishOutcome::Finished(conversation));
        }

        // Nothing was written; explain why.
        match check_finishable(&conversation)? {
            FinishDecision::AlreadyClosed => Ok(FinishOutcome::AlreadyClosed(conversation)),
            FinishDecision::Proceed => Err(DomainError::Conflict(format!(
                "Conversation {} changed concurrently",
                conversation_id
            ))),
        }
    }

    async fn rate_conversation(&self, conversation_id: &str, rate: u8) -> DomainResult<Conversation> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE conversations SET rate = ?
             WHERE id = ? AND status = 'closed' AND deleted_at IS NULL",
        )
        .bind(rate as i64)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        let conversation = fetch_conversation(&mut tx, conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        if updated.rows_affected() == 0 {
            check_ratable(&conversation)?;
            return Err(DomainError::Conflict(format!(
                "Conversation {} changed concurrently",
                conversation_id
            )));
        }

        tx.commit().await?;
        Ok(conversation)
    }
}
