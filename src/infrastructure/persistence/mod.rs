use crate::domain::errors::DomainError;
use log::LevelFilter;
use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions, AnyRow},
    Any, AnyPool, ConnectOptions, Decode, Row, Type, ValueRef,
};
use std::str::FromStr;

mod agents;
mod consumers;
mod conversations;
mod messages;

pub struct Database {
    pub(crate) pool: AnyPool,
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            other => {
                tracing::error!("Database error: {:?}", other);
                DomainError::Internal(format!("Database error: {}", other))
            }
        }
    }
}

/// Reads a nullable column. The Any driver refuses to decode SQL `NULL`
/// into `Option<T>`, so the null check happens on the raw value first.
pub(crate) fn get_optional<T>(row: &AnyRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> Decode<'r, Any> + Type<Any>,
{
    if row.try_get_raw(column)?.is_null() {
        return Ok(None);
    }
    row.try_get::<T, _>(column).map(Some)
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let mut connect_options = AnyConnectOptions::from_str(database_url)?;

        // Configure logging
        connect_options = connect_options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, std::time::Duration::from_secs(1));

        let is_sqlite = database_url.starts_with("sqlite");

        let pool = AnyPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    // Per-connection settings; WAL is set once below.
                    if is_sqlite {
                        sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                        sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                        sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;

        if is_sqlite {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
        }

        tracing::info!("Database pool ready");

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
