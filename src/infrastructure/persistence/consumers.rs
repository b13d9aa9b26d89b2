use crate::domain::entities::Consumer;
use crate::domain::errors::DomainResult;
use crate::domain::ports::consumer_repository::ConsumerRepository;
use crate::infrastructure::persistence::{get_optional, Database};
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl ConsumerRepository for Database {
    async fn create_consumer(&self, consumer: &Consumer) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO consumers (id, first_name, last_name, email, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&consumer.id)
        .bind(&consumer.first_name)
        .bind(&consumer.last_name)
        .bind(&consumer.email)
        .bind(&consumer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_consumer_by_id(&self, id: &str) -> DomainResult<Option<Consumer>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, created_at
             FROM consumers
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            Ok(Some(Consumer {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: get_optional(&row, "last_name")?,
                email: row.try_get("email")?,
                created_at: row.try_get("created_at")?,
            }))
        } else {
            Ok(None)
        }
    }
}
