use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::json;
use smart_file_manager::infrastructure::database::run_migrations;
use smart_file_manager::models::{FileCategory, FileFilter, FileStatus, NewFile};
use smart_file_manager::services::metadata_store::{MetadataStore, StoreError};

const LEGACY_TABLE: &str = "CREATE TABLE files (
    id TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size INTEGER NOT NULL,
    status TEXT NOT NULL,
    folder_path TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    description TEXT
)";

async fn empty_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opt).await.unwrap()
}

async fn legacy_store() -> MetadataStore {
    let db = empty_db().await;
    db.execute(Statement::from_string(
        db.get_database_backend(),
        LEGACY_TABLE.to_string(),
    ))
    .await
    .unwrap();
    run_migrations(&db).await.unwrap();
    MetadataStore::connect(db).await.unwrap()
}

fn new_file(name: &str, mime: &str, hash: &str) -> NewFile {
    NewFile {
        filename: name.to_string(),
        mime_type: mime.to_string(),
        size_bytes: 4096,
        content_hash: hash.to_string(),
        storage_path: Some(format!("/s/{}", name)),
        folder_path: "/".to_string(),
        metadata: json!({ "camera": "x100" }),
        tags: vec!["holiday".to_string()],
        uploader_id: None,
        owner_id: None,
    }
}

#[tokio::test]
async fn test_missing_files_table_is_reported() {
    let db = empty_db().await;
    let err = MetadataStore::connect(db).await.err().unwrap();
    assert!(matches!(err, StoreError::Schema(_)));
}

#[tokio::test]
async fn test_legacy_layout_round_trips_known_columns() {
    let store = legacy_store().await;
    assert_eq!(store.schema().name_column, "filename");
    assert_eq!(store.schema().size_column, "size");
    assert!(!store.schema().has("ocr_text"));

    let outcome = store
        .insert_file(new_file("beach.jpg", "image/jpeg", "h1"), false)
        .await
        .unwrap();
    assert!(outcome.created);

    let file = store.get_file(&outcome.id).await.unwrap().unwrap();
    assert_eq!(file.filename, "beach.jpg");
    assert_eq!(file.size_bytes, 4096);
    assert_eq!(file.status, FileStatus::Pending);
    // No category column: derived from the MIME type on read.
    assert_eq!(file.category, FileCategory::Image);
    // Columns the table lacks read back as empty.
    assert!(file.storage_path.is_none());
    assert!(file.tags.is_empty());
    assert_eq!(file.metadata, json!({}));

    let again = store
        .insert_file(new_file("copy.jpg", "image/jpeg", "h1"), false)
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.id, outcome.id);
}

#[tokio::test]
async fn test_legacy_layout_skips_missing_columns_on_update() {
    let store = legacy_store().await;
    let id = store
        .insert_file(new_file("notes.pdf", "application/pdf", "h2"), false)
        .await
        .unwrap()
        .id;

    assert!(store.update_description(&id, "Meeting notes").await.unwrap());
    assert!(!store.update_ocr_text(&id, "ignored").await.unwrap());
    assert!(!store.update_thumbnail(&id, "t.jpg").await.unwrap());
    assert!(
        store
            .update_status(&id, FileStatus::Processing, Some("ingest"))
            .await
            .unwrap()
    );

    let file = store.get_file(&id).await.unwrap().unwrap();
    assert_eq!(file.description.as_deref(), Some("Meeting notes"));
    assert!(file.ocr_text.is_none());
    assert!(file.stage.is_none());
    assert_eq!(file.status, FileStatus::Processing);
}

#[tokio::test]
async fn test_legacy_layout_filters_category_in_memory() {
    let store = legacy_store().await;
    for (name, mime, hash) in [
        ("a.jpg", "image/jpeg", "c1"),
        ("b.pdf", "application/pdf", "c2"),
        ("c.png", "image/png", "c3"),
        ("d.bin", "application/octet-stream", "c4"),
    ] {
        store.insert_file(new_file(name, mime, hash), false).await.unwrap();
    }

    let filter = FileFilter {
        category: Some(FileCategory::Image),
        ..FileFilter::default()
    };
    let (files, total) = store.list_files(&filter, 1, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(files.len(), 1);

    let (files, total) = store.list_files(&filter, 10, 1).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(files.len(), 1);

    let (found, total) = store
        .search_text("B.PDF", &FileFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].filename, "b.pdf");
}
