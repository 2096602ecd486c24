//! SQLite-backed [`ContextStore`] implementation.
//!
//! Maps each [`ContextStore`] operation onto the `context_entries` table
//! created by [`crate::migrate`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use context_relevance_core::models::{ContextEntry, Magnitude};
use context_relevance_core::store::{check_supersession, ContextStore, StoreError};

use crate::config::Config;
use crate::{db, migrate};

const SELECT_COLUMNS: &str = "SELECT id, client_id, category, title, description, \
     event_date, start_date, end_date, magnitude, comparison_significant, \
     superseded_by, created_at, updated_at FROM context_entries";

/// SQLite implementation of the [`ContextStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, applying migrations first.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<ContextEntry> {
    let id: String = row.try_get("id")?;
    let magnitude = row
        .try_get::<Option<String>, _>("magnitude")?
        .map(|m| m.parse::<Magnitude>())
        .transpose()
        .with_context(|| format!("Corrupt magnitude on entry {}", id))?;

    Ok(ContextEntry {
        client_id: row.try_get("client_id")?,
        category: row.try_get("category")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        event_date: row.try_get("event_date")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        magnitude,
        comparison_significant: row.try_get("comparison_significant")?,
        superseded_by: row.try_get("superseded_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        id,
    })
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn insert(&self, entry: &ContextEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO context_entries (id, client_id, category, title, description,
                                         event_date, start_date, end_date, magnitude,
                                         comparison_significant, superseded_by,
                                         created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.client_id)
        .bind(&entry.category)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.event_date)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.magnitude.map(|m| m.as_str()))
        .bind(entry.comparison_significant)
        .bind(&entry.superseded_by)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(entry.id.clone()).into());
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContextEntry>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn list_for_client(&self, client_id: &str) -> Result<Vec<ContextEntry>> {
        let rows = sqlx::query(&format!(
            "{} WHERE client_id = ? ORDER BY rowid ASC",
            SELECT_COLUMNS
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn update(&self, entry: &ContextEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE context_entries SET
                category = ?, title = ?, description = ?,
                event_date = ?, start_date = ?, end_date = ?,
                magnitude = ?, comparison_significant = ?,
                superseded_by = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.category)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.event_date)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.magnitude.map(|m| m.as_str()))
        .bind(entry.comparison_significant)
        .bind(&entry.superseded_by)
        .bind(entry.updated_at)
        .bind(&entry.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(entry.id.clone()).into());
        }
        Ok(())
    }

    async fn supersede(&self, id: &str, by: &str, at: DateTime<Utc>) -> Result<ContextEntry> {
        let mut tx = self.pool.begin().await?;

        let query = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let mut entry = match sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        {
            Some(row) => row_to_entry(&row)?,
            None => return Err(StoreError::NotFound(id.to_string()).into()),
        };
        let replacement = match sqlx::query(&query)
            .bind(by)
            .fetch_optional(&mut *tx)
            .await?
        {
            Some(row) => row_to_entry(&row)?,
            None => return Err(StoreError::NotFound(by.to_string()).into()),
        };

        check_supersession(&entry, &replacement)?;

        sqlx::query("UPDATE context_entries SET superseded_by = ?, updated_at = ? WHERE id = ?")
            .bind(&replacement.id)
            .bind(at)
            .bind(&entry.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        entry.superseded_by = Some(replacement.id);
        entry.updated_at = at;
        Ok(entry)
    }
}
