//! SQLite-backed history repository.
//!
//! Rows hold the serialized entry JSON plus extracted columns used for
//! ordering and pruning. Upserts are keyed by run id.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::HistoryEntry;
use crate::domain::ports::HistoryRepository;

const MIGRATION_MARKER: &str = "flat_file_migration";

pub struct SqliteHistoryRepo {
    pool: SqlitePool,
}

impl SqliteHistoryRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &SqliteRow) -> Result<HistoryEntry, StoreError> {
        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }

    /// Whether the one-time flat-file migration has already happened.
    pub async fn migration_done(&self) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT value FROM history_meta WHERE key = ?")
            .bind(MIGRATION_MARKER)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Record that the flat-file migration is complete, even when there was
    /// nothing to migrate.
    pub async fn mark_migration_done(&self) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO history_meta (key, value) VALUES (?, ?)")
            .bind(MIGRATION_MARKER)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepo {
    async fn load_all(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM history ORDER BY saved_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::row_to_entry(row) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(error = %err, "skipping unreadable history row"),
            }
        }
        Ok(entries)
    }

    async fn get(&self, id: Uuid) -> Result<Option<HistoryEntry>, StoreError> {
        let row = sqlx::query("SELECT payload FROM history WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn put(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let payload = serde_json::to_string(entry)?;
        sqlx::query(
            "INSERT OR REPLACE INTO history \
             (id, saved_at, completed_at, model_id, sweep_mode, payload) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.saved_at.to_rfc3339())
        .bind(entry.completed_at.map(|t| t.to_rfc3339()))
        .bind(entry.model_id.clone())
        .bind(entry.sweep_mode.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut deleted = 0usize;
        for id in ids {
            let result = sqlx::query("DELETE FROM history WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected() as usize;
        }
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM history")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }

    async fn oldest_ids(&self, n: usize) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query("SELECT id FROM history ORDER BY saved_at ASC LIMIT ?")
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            ids.push(
                Uuid::parse_str(&id)
                    .map_err(|e| StoreError::Database(format!("bad id in history: {e}")))?,
            );
        }
        Ok(ids)
    }
}
