use deskqueue::bootstrap;
use deskqueue::config::Config;
use deskqueue::infrastructure::http::middleware::AppState;
use deskqueue::infrastructure::persistence::Database;
use std::collections::HashMap;

pub async fn setup_test_db() -> Database {
    // Install drivers for AnyPool (required for tests)
    sqlx::any::install_default_drivers();

    // File-backed SQLite, one file per test so tests run in parallel
    let path = std::env::temp_dir().join(format!("deskqueue_test_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    db
}

/// Config with the scheduler disabled and the given capacity cap.
pub fn test_config(agent_capacity: i64) -> Config {
    let mut vars = HashMap::new();
    vars.insert("AGENT_CAPACITY", agent_capacity.to_string());
    vars.insert("SCHEDULER_ENABLED", "false".to_string());
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

pub async fn setup_test_state(agent_capacity: i64) -> (Database, AppState) {
    let db = setup_test_db().await;
    let state = bootstrap::build_app_state(db.clone(), &test_config(agent_capacity));
    (db, state)
}

/// Marks a conversation soft-deleted directly in storage.
pub async fn soft_delete_conversation(db: &Database, conversation_id: &str) {
    sqlx::query("UPDATE conversations SET deleted_at = ? WHERE id = ?")
        .bind(deskqueue::shared::utils::now_rfc3339())
        .bind(conversation_id)
        .execute(db.pool())
        .await
        .expect("Failed to soft delete conversation");
}
