use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Dates are ISO-8601 text; timestamps are RFC 3339 text.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_entries (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            event_date TEXT,
            start_date TEXT,
            end_date TEXT,
            magnitude TEXT CHECK (magnitude IN ('minor', 'moderate', 'major')),
            comparison_significant INTEGER,
            superseded_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_context_entries_client_id ON context_entries(client_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_context_entries_category ON context_entries(category)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("migrations applied");
    Ok(())
}
