use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Canonical `files` table. Reads and writes go through the metadata store's
/// dynamic queries so that legacy column layouts keep working; this entity
/// only defines the table created on fresh deployments.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub content_hash: String,
    pub original_name: String,
    pub current_name: Option<String>,
    pub mime_type: String,
    pub size_bytes: i64,
    pub category: Option<String>,
    pub storage_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub status: String,
    pub stage: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ocr_text: Option<String>,
    pub detected_objects: Option<Json>,
    pub tags: Option<Json>,
    pub categories: Option<Json>,
    #[sea_orm(indexed)]
    pub folder_path: String,
    pub metadata: Option<Json>,
    pub uploaded_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
    pub last_accessed_at: Option<DateTimeUtc>,
    pub uploader_id: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
