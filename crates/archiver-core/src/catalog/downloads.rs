//! Download rows: the [`DownloadStore`] implementation for [`CatalogDb`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, CatalogDb};
use super::store::DownloadStore;
use super::types::{ArchiveId, ArchiveStatus, DownloadId, DownloadRecord, DownloadStatus, NewDownload};

fn download_from_row(row: &SqliteRow) -> Result<DownloadRecord> {
    let status: String = row.get("status");
    let size: Option<i64> = row.get("size");
    Ok(DownloadRecord {
        id: row.get("id"),
        archive_id: row.get("archive_id"),
        filename: row.get("filename"),
        url: row.get("url"),
        status: DownloadStatus::parse(&status)
            .with_context(|| format!("unknown download status {:?}", status))?,
        size: size.and_then(|s| u64::try_from(s).ok()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn size_to_db(size: u64) -> Result<i64> {
    i64::try_from(size).with_context(|| format!("size {} out of range", size))
}

impl CatalogDb {
    /// Downloads of `archive_id` in `status`, ordered by filename.
    pub async fn list_downloads_with_status(
        &self,
        archive_id: ArchiveId,
        status: DownloadStatus,
    ) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, archive_id, filename, url, status, size, created_at, updated_at
            FROM downloads
            WHERE archive_id = ?1 AND status = ?2
            ORDER BY filename ASC
            "#,
        )
        .bind(archive_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(download_from_row).collect()
    }
}

#[async_trait]
impl DownloadStore for CatalogDb {
    async fn create_or_update_download(
        &self,
        archive_id: ArchiveId,
        download: &NewDownload,
    ) -> Result<DownloadId> {
        let now = unix_timestamp();
        let size = download.size.map(size_to_db).transpose()?;
        let row = sqlx::query(
            r#"
            INSERT INTO downloads (archive_id, filename, url, status, size, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT (archive_id, filename) DO UPDATE SET
                url = excluded.url,
                size = COALESCE(excluded.size, downloads.size),
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(archive_id)
        .bind(&download.filename)
        .bind(&download.url)
        .bind(DownloadStatus::Pending.as_str())
        .bind(size)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert download {}", download.filename))?;
        Ok(row.get("id"))
    }

    async fn update_status(&self, id: DownloadId, status: DownloadStatus) -> Result<()> {
        sqlx::query(r#"UPDATE downloads SET status = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(status.as_str())
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_size(&self, id: DownloadId, size: u64) -> Result<()> {
        sqlx::query(r#"UPDATE downloads SET size = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(size_to_db(size)?)
            .bind(unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_downloads(&self, archive_id: ArchiveId) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, archive_id, filename, url, status, size, created_at, updated_at
            FROM downloads
            WHERE archive_id = ?1
            ORDER BY filename ASC
            "#,
        )
        .bind(archive_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(download_from_row).collect()
    }

    async fn delete_downloads(&self, archive_id: ArchiveId) -> Result<u64> {
        let removed = sqlx::query(r#"DELETE FROM downloads WHERE archive_id = ?1"#)
            .bind(archive_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed)
    }

    async fn set_archive_status(&self, archive_id: ArchiveId, status: ArchiveStatus) -> Result<()> {
        sqlx::query(r#"UPDATE archives SET status = ?1, updated_at = ?2 WHERE id = ?3"#)
            .bind(status.as_str())
            .bind(unix_timestamp())
            .bind(archive_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
