use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::entities::folders;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Folder {
    pub path: String,
    pub name: String,
    pub parent_path: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<folders::Model> for Folder {
    fn from(model: folders::Model) -> Self {
        Self {
            path: model.path,
            name: model.name,
            parent_path: model.parent_path,
            metadata: model.metadata,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFolder {
    pub path: String,
    pub name: String,
    pub parent_path: Option<String>,
    pub metadata: Value,
}

/// A set of files sharing one content hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub size: usize,
    pub file_ids: Vec<String>,
}
