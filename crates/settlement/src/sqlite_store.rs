use async_trait::async_trait;
use intent_settle_types::{Intent, IntentId, IntentKind, IntentStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::store::{IntentStore, StoreError};

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

const CREATE_INTENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS intents (
    id TEXT PRIMARY KEY NOT NULL,
    status TEXT NOT NULL,
    kind TEXT NOT NULL,
    source_network TEXT NOT NULL,
    dest_network TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_intents_status ON intents (status, created_at)";

/// Durable store. The full intent is kept as a JSON body; status and
/// timestamps are duplicated into columns for listing.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `db_path`.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in [CREATE_INTENTS_TABLE, CREATE_STATUS_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        }
        Ok(())
    }

    fn row_to_intent(row: &sqlx::sqlite::SqliteRow) -> Result<Intent, StoreError> {
        let body: String = row
            .try_get("body")
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn rows_to_intents(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Intent>, StoreError> {
        rows.iter().map(Self::row_to_intent).collect()
    }
}

fn kind_to_string(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Swap => "swap",
        IntentKind::Payment => "payment",
    }
}

#[async_trait]
impl IntentStore for SqliteStore {
    async fn insert(&self, intent: &Intent) -> Result<(), StoreError> {
        let body = serde_json::to_string(intent)?;

        let result = sqlx::query(
            r#"
            INSERT INTO intents (
                id, status, kind, source_network, dest_network, body, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(intent.id.as_str())
        .bind(intent.status.as_str())
        .bind(kind_to_string(intent.kind))
        .bind(intent.source_network.as_str())
        .bind(intent.dest_network.as_str())
        .bind(&body)
        .bind(intent.created_at as i64)
        .bind(intent.updated_at as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateId(intent.id.to_string()))
            }
            Err(e) => Err(StoreError::DatabaseError(e.to_string())),
        }
    }

    async fn get(&self, id: &IntentId) -> Result<Option<Intent>, StoreError> {
        let row = sqlx::query("SELECT body FROM intents WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_intent(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, intent: &Intent) -> Result<(), StoreError> {
        let body = serde_json::to_string(intent)?;

        let result = sqlx::query(
            r#"
            UPDATE intents
            SET status = ?, body = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(intent.status.as_str())
        .bind(&body)
        .bind(intent.updated_at as i64)
        .bind(intent.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(intent.id.to_string()));
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: IntentStatus,
        limit: usize,
    ) -> Result<Vec<Intent>, StoreError> {
        let rows = sqlx::query(
            "SELECT body FROM intents WHERE status = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Self::rows_to_intents(&rows)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Intent>, StoreError> {
        let rows = sqlx::query("SELECT body FROM intents ORDER BY created_at ASC, id ASC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Self::rows_to_intents(&rows)
    }
}
