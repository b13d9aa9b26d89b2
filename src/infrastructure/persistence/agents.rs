use crate::domain::entities::{Agent, AgentLoad};
use crate::domain::errors::DomainResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::infrastructure::persistence::conversations::count_open_conversations;
use crate::infrastructure::persistence::Database;
use crate::shared::utils::now_rfc3339;
use async_trait::async_trait;
use sqlx::{any::AnyRow, Row};

fn agent_from_row(row: &AnyRow) -> Result<Agent, sqlx::Error> {
    Ok(Agent {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        profile: row.try_get("profile")?,
        available: row.try_get::<i64, _>("available")? != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AgentRepository for Database {
    async fn create_agent(&self, agent: &Agent) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO agents (id, username, profile, available, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&agent.id)
        .bind(&agent.username)
        .bind(&agent.profile)
        .bind(if agent.available { 1_i64 } else { 0_i64 })
        .bind(&agent.created_at)
        .bind(&agent.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_agent_by_id(&self, id: &str) -> DomainResult<Option<Agent>> {
        let row = sqlx::query(
            "SELECT id, username, profile, available, created_at, updated_at
             FROM agents
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(agent_from_row).transpose()?)
    }

    async fn set_agent_availability(
        &self,
        id: &str,
        available: bool,
    ) -> DomainResult<Option<Agent>> {
        let result = sqlx::query(
            "UPDATE agents SET available = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(if available { 1_i64 } else { 0_i64 })
        .bind(now_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_agent_by_id(id).await
    }

    async fn get_available_agent_loads(&self) -> DomainResult<Vec<AgentLoad>> {
        let rows = sqlx::query(
            "SELECT a.id AS agent_id, a.username AS username, COUNT(c.id) AS open_count
             FROM agents a
             LEFT JOIN conversations c
               ON c.agent_id = a.id AND c.status = 'open' AND c.deleted_at IS NULL
             WHERE a.available = 1 AND a.deleted_at IS NULL
             GROUP BY a.id, a.username
             ORDER BY a.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut loads = Vec::with_capacity(rows.len());
        for row in rows {
            loads.push(AgentLoad {
                agent_id: row.try_get("agent_id")?,
                username: row.try_get("username")?,
                open_count: row.try_get("open_count")?,
            });
        }

        Ok(loads)
    }

    async fn count_open_conversations(&self, agent_id: &str) -> DomainResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(count_open_conversations(&mut conn, agent_id).await?)
    }
}
