//! Archive CRUD.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, CatalogDb};
use super::types::{ArchiveId, ArchiveRecord, ArchiveStatus};

fn archive_from_row(row: &SqliteRow) -> Result<ArchiveRecord> {
    let status: String = row.get("status");
    Ok(ArchiveRecord {
        id: row.get("id"),
        key: row.get("key"),
        status: ArchiveStatus::parse(&status)
            .with_context(|| format!("unknown archive status {:?}", status))?,
        priority: row.get("priority"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl CatalogDb {
    /// Insert a new archive in `analyzing` state. Fails if the key already exists.
    pub async fn create_archive(&self, key: &str, priority: i64) -> Result<ArchiveId> {
        let now = unix_timestamp();
        let row_id = sqlx::query(
            r#"
            INSERT INTO archives (key, status, priority, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
        )
        .bind(key)
        .bind(ArchiveStatus::Analyzing.as_str())
        .bind(priority)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("create archive {}", key))?
        .last_insert_rowid();
        Ok(row_id)
    }

    /// All archives, highest priority first.
    pub async fn list_archives(&self) -> Result<Vec<ArchiveRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key, status, priority, created_at, updated_at
            FROM archives
            ORDER BY priority DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(archive_from_row).collect()
    }

    pub async fn get_archive(&self, id: ArchiveId) -> Result<Option<ArchiveRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, key, status, priority, created_at, updated_at
            FROM archives
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(archive_from_row).transpose()
    }

    pub async fn find_archive_by_key(&self, key: &str) -> Result<Option<ArchiveRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, key, status, priority, created_at, updated_at
            FROM archives
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(archive_from_row).transpose()
    }

    /// Change an archive's priority. Returns false if it does not exist.
    pub async fn set_archive_priority(&self, id: ArchiveId, priority: i64) -> Result<bool> {
        let updated = sqlx::query(r#"UPDATE archives SET priority = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(priority)
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    /// Delete an archive and all of its downloads. Returns false if it did not exist.
    pub async fn delete_archive(&self, id: ArchiveId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(r#"DELETE FROM downloads WHERE archive_id = ?1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query(r#"DELETE FROM archives WHERE id = ?1"#)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }
}
