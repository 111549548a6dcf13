//! Tests for the catalog (use the in-memory DB helper from db).

use crate::catalog::db::open_memory;
use crate::catalog::{ArchiveStatus, DownloadStatus, DownloadStore, NewDownload};

fn new_download(name: &str, size: Option<u64>) -> NewDownload {
    NewDownload {
        filename: format!("/download/item/{}", name),
        url: format!("https://archive.org/download/item/{}", name),
        size,
    }
}

#[tokio::test]
async fn archive_lifecycle() {
    let db = open_memory().await.unwrap();
    let id = db.create_archive("item", 0).await.unwrap();

    let archive = db.get_archive(id).await.unwrap().unwrap();
    assert_eq!(archive.key, "item");
    assert_eq!(archive.status, ArchiveStatus::Analyzing);

    db.set_archive_status(id, ArchiveStatus::Pending).await.unwrap();
    let found = db.find_archive_by_key("item").await.unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.status, ArchiveStatus::Pending);

    assert!(db.find_archive_by_key("other").await.unwrap().is_none());
    assert!(db.get_archive(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_key_is_rejected() {
    let db = open_memory().await.unwrap();
    db.create_archive("item", 0).await.unwrap();
    assert!(db.create_archive("item", 0).await.is_err());
}

#[tokio::test]
async fn list_orders_by_priority() {
    let db = open_memory().await.unwrap();
    let low = db.create_archive("low", 0).await.unwrap();
    let high = db.create_archive("high", 0).await.unwrap();
    assert!(db.set_archive_priority(high, 10).await.unwrap());
    let ids: Vec<_> = db.list_archives().await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![high, low]);
}

#[tokio::test]
async fn upsert_keeps_row_and_status() {
    let db = open_memory().await.unwrap();
    let archive = db.create_archive("item", 0).await.unwrap();

    let id = db
        .create_or_update_download(archive, &new_download("a.mp4", Some(100)))
        .await
        .unwrap();
    db.update_status(id, DownloadStatus::Downloaded).await.unwrap();

    let again = db
        .create_or_update_download(archive, &new_download("a.mp4", None))
        .await
        .unwrap();
    assert_eq!(again, id);

    let rows = db.list_downloads(archive).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, DownloadStatus::Downloaded);
    assert_eq!(rows[0].size, Some(100));
}

#[tokio::test]
async fn update_size_and_list_order() {
    let db = open_memory().await.unwrap();
    let archive = db.create_archive("item", 0).await.unwrap();
    let b = db
        .create_or_update_download(archive, &new_download("b.mp4", None))
        .await
        .unwrap();
    db.create_or_update_download(archive, &new_download("a.mp4", Some(5)))
        .await
        .unwrap();
    db.update_size(b, 4096).await.unwrap();

    let rows = db.list_downloads(archive).await.unwrap();
    assert_eq!(rows[0].filename, "/download/item/a.mp4");
    assert_eq!(rows[1].size, Some(4096));
    assert_eq!(rows[1].status, DownloadStatus::Pending);
}

#[tokio::test]
async fn delete_archive_cascades() {
    let db = open_memory().await.unwrap();
    let keep = db.create_archive("keep", 0).await.unwrap();
    let gone = db.create_archive("gone", 0).await.unwrap();
    db.create_or_update_download(keep, &new_download("k.mp4", None))
        .await
        .unwrap();
    db.create_or_update_download(gone, &new_download("g1.mp4", None))
        .await
        .unwrap();
    db.create_or_update_download(gone, &new_download("g2.mp4", None))
        .await
        .unwrap();

    assert!(db.delete_archive(gone).await.unwrap());
    assert!(!db.delete_archive(gone).await.unwrap());
    assert!(db.list_downloads(gone).await.unwrap().is_empty());
    assert_eq!(db.list_downloads(keep).await.unwrap().len(), 1);
    assert_eq!(db.list_archives().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_downloads_counts_rows() {
    let db = open_memory().await.unwrap();
    let archive = db.create_archive("item", 0).await.unwrap();
    for name in ["a", "b", "c"] {
        db.create_or_update_download(archive, &new_download(name, None))
            .await
            .unwrap();
    }
    assert_eq!(db.delete_downloads(archive).await.unwrap(), 3);
    assert!(db.list_downloads(archive).await.unwrap().is_empty());
}

#[tokio::test]
async fn set_priority_of_missing_archive() {
    let db = open_memory().await.unwrap();
    assert!(!db.set_archive_priority(42, 1).await.unwrap());
}

#[tokio::test]
async fn list_downloads_filtered_by_status() {
    let db = open_memory().await.unwrap();
    let id = db.create_archive("item", 0).await.unwrap();
    let other = db.create_archive("other", 0).await.unwrap();
    let a = db.create_or_update_download(id, &new_download("a.mp4", None)).await.unwrap();
    db.create_or_update_download(id, &new_download("b.mp4", None)).await.unwrap();
    let c = db.create_or_update_download(id, &new_download("c.mp4", None)).await.unwrap();
    let elsewhere = db.create_or_update_download(other, &new_download("a.mp4", None)).await.unwrap();
    db.update_status(a, DownloadStatus::Downloaded).await.unwrap();
    db.update_status(c, DownloadStatus::Downloaded).await.unwrap();
    db.update_status(elsewhere, DownloadStatus::Downloaded).await.unwrap();

    let done = db
        .list_downloads_with_status(id, DownloadStatus::Downloaded)
        .await
        .unwrap();
    assert_eq!(done.iter().map(|d| d.id).collect::<Vec<_>>(), vec![a, c]);
    let pending = db
        .list_downloads_with_status(id, DownloadStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].filename.ends_with("b.mp4"));
    assert!(db
        .list_downloads_with_status(id, DownloadStatus::Downloading)
        .await
        .unwrap()
        .is_empty());
}
