use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use std::collections::HashSet;
use tracing::info;

use super::StoreError;

pub const FILES_TABLE: &str = "files";

/// Columns every deployment must have, besides the name and size columns.
const REQUIRED: &[&str] = &[
    "id",
    "content_hash",
    "mime_type",
    "status",
    "folder_path",
    "uploaded_at",
];

/// Columns the store uses when present and silently skips otherwise.
pub const OPTIONAL: &[&str] = &[
    "current_name",
    "category",
    "storage_path",
    "thumbnail_path",
    "stage",
    "description",
    "ocr_text",
    "detected_objects",
    "tags",
    "categories",
    "metadata",
    "processed_at",
    "last_accessed_at",
    "uploader_id",
    "owner_id",
];

/// Column layout of the `files` table, discovered once at startup.
#[derive(Debug, Clone)]
pub struct SchemaProfile {
    pub name_column: &'static str,
    pub size_column: &'static str,
    columns: HashSet<String>,
}

impl SchemaProfile {
    /// Layout of a table created by this service.
    pub fn canonical() -> Self {
        let columns = REQUIRED
            .iter()
            .chain(OPTIONAL)
            .chain(["original_name", "size_bytes"].iter())
            .map(|c| c.to_string())
            .collect();
        Self {
            name_column: "original_name",
            size_column: "size_bytes",
            columns,
        }
    }

    pub fn from_columns<I, S>(columns: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: HashSet<String> = columns
            .into_iter()
            .map(|c| c.into().to_lowercase())
            .collect();

        if columns.is_empty() {
            return Err(StoreError::Schema(format!(
                "table '{}' does not exist",
                FILES_TABLE
            )));
        }

        let name_column = if columns.contains("original_name") {
            "original_name"
        } else if columns.contains("filename") {
            "filename"
        } else {
            return Err(StoreError::Schema(
                "files table has neither original_name nor filename".to_string(),
            ));
        };

        let size_column = if columns.contains("size_bytes") {
            "size_bytes"
        } else if columns.contains("size") {
            "size"
        } else {
            return Err(StoreError::Schema(
                "files table has neither size_bytes nor size".to_string(),
            ));
        };

        if let Some(missing) = REQUIRED.iter().find(|c| !columns.contains(**c)) {
            return Err(StoreError::Schema(format!(
                "files table is missing required column '{}'",
                missing
            )));
        }

        Ok(Self {
            name_column,
            size_column,
            columns,
        })
    }

    pub fn has(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Every known column present in the table, in a stable order.
    pub fn select_columns(&self) -> Vec<&'static str> {
        let mut cols: Vec<&'static str> = REQUIRED.to_vec();
        cols.push(self.name_column);
        cols.push(self.size_column);
        cols.extend(OPTIONAL.iter().copied().filter(|c| self.has(c)));
        cols
    }

    pub fn missing_optional(&self) -> Vec<&'static str> {
        OPTIONAL.iter().copied().filter(|c| !self.has(c)).collect()
    }

    /// Read the column list of `files` from the database catalog.
    pub async fn discover(db: &DatabaseConnection) -> Result<Self, StoreError> {
        let backend = db.get_database_backend();
        let (sql, column) = match backend {
            DatabaseBackend::Sqlite => (
                format!("SELECT name FROM pragma_table_info('{}')", FILES_TABLE),
                "name",
            ),
            DatabaseBackend::Postgres => (
                format!(
                    "SELECT column_name::text AS column_name FROM information_schema.columns \
                     WHERE table_name = '{}' AND table_schema = current_schema()",
                    FILES_TABLE
                ),
                "column_name",
            ),
            DatabaseBackend::MySql => (
                format!(
                    "SELECT column_name AS column_name FROM information_schema.columns \
                     WHERE table_name = '{}' AND table_schema = DATABASE()",
                    FILES_TABLE
                ),
                "column_name",
            ),
        };

        let rows = db
            .query_all(Statement::from_string(backend, sql))
            .await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<String>("", column)?);
        }

        let profile = Self::from_columns(names)?;
        info!(
            "🔎 Files schema: name={}, size={}, missing optional columns: {:?}",
            profile.name_column,
            profile.size_column,
            profile.missing_optional()
        );
        Ok(profile)
    }
}
