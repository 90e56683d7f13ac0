//! Share record persistence
//!
//! The only state the bridge keeps is whether a content item has already
//! been mirrored. [`ShareStore`] is the seam the publisher writes through;
//! [`Database`] is the SQLite implementation used by the CLI.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{DbError, Result};
use crate::types::ShareRecord;

/// Per-content "already shared" flag store
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Whether `content_id` has been mirrored
    async fn is_shared(&self, content_id: u64) -> Result<bool>;

    /// Persist the share flag for a content item
    async fn mark_shared(&self, record: &ShareRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Get the share record for a content item
    pub async fn get_share_record(&self, content_id: u64) -> Result<Option<ShareRecord>> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"
            SELECT content_id, shared, record_uri, shared_at
            FROM share_records WHERE content_id = ?
            "#,
        )
        .bind(content_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| ShareRecord {
            content_id: r.get::<i64, _>("content_id") as u64,
            shared: r.get::<i64, _>("shared") != 0,
            record_uri: r.get("record_uri"),
            shared_at: r.get("shared_at"),
        }))
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn is_shared(&self, content_id: u64) -> Result<bool> {
        Ok(self
            .get_share_record(content_id)
            .await?
            .is_some_and(|r| r.shared))
    }

    async fn mark_shared(&self, record: &ShareRecord) -> Result<()> {
        let shared = if record.shared { 1 } else { 0 };

        sqlx::query(
            r#"
            INSERT INTO share_records (content_id, shared, record_uri, shared_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                shared = excluded.shared,
                record_uri = excluded.record_uri,
                shared_at = excluded.shared_at
            "#,
        )
        .bind(record.content_id as i64)
        .bind(shared)
        .bind(&record.record_uri)
        .bind(record.shared_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

/// Share store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryShareStore {
    records: Arc<Mutex<HashMap<u64, ShareRecord>>>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, content_id: u64) -> Option<ShareRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(&content_id).cloned())
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn is_shared(&self, content_id: u64) -> Result<bool> {
        Ok(self.get(content_id).is_some_and(|r| r.shared))
    }

    async fn mark_shared(&self, record: &ShareRecord) -> Result<()> {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.content_id, record.clone());
        }
        Ok(())
    }
}
