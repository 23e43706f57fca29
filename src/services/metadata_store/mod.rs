//! Typed access to the `files`, `folders` and `suggestions` tables.
//!
//! Folders and suggestions go through their sea-orm entities. Files are
//! read and written with dynamic queries shaped by the [`SchemaProfile`]
//! discovered at startup, so legacy layouts (`filename`/`size`, missing
//! optional columns) keep working.

pub mod schema;

pub use schema::SchemaProfile;

use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::sea_query::{
    Alias, Cond, Expr, Func, LikeExpr, OnConflict, Order, Query, SelectStatement, SimpleExpr,
    Value as SqlValue,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QueryResult, Set, Statement, TransactionTrait,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{folders, suggestions};
use crate::models::{
    DuplicateGroup, FileCategory, FileFilter, FileRecord, FileStatus, Folder, NewFile, NewFolder,
    NewSuggestion, Suggestion, SuggestionFilter, SuggestionKind, SuggestionStatus,
};
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::validation::{folder_name, parent_folder};
use schema::FILES_TABLE;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("folder {path} still holds {file_count} file(s)")]
    FolderNotEmpty { path: String, file_count: u64 },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// Result of [`MetadataStore::insert_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: String,
    /// False when an existing record with the same hash was returned.
    pub created: bool,
}

#[derive(Clone)]
pub struct MetadataStore {
    db: DatabaseConnection,
    schema: Arc<SchemaProfile>,
    hash_locks: KeyedMutex,
}

fn col(name: &str) -> Alias {
    Alias::new(name)
}

fn files_table() -> Alias {
    Alias::new(FILES_TABLE)
}

fn val<V: Into<SqlValue>>(v: V) -> SqlValue {
    v.into()
}

fn json_val(v: Value) -> SqlValue {
    SqlValue::Json(Some(Box::new(v)))
}

fn like_pattern(query: &str) -> LikeExpr {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    LikeExpr::new(format!("%{}%", escaped)).escape('\\')
}

fn read_time(row: &QueryResult, column: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    match row.try_get::<Option<DateTime<Utc>>>("", column) {
        Ok(v) => Ok(v),
        // `timestamp without time zone` on older deployments
        Err(_) => Ok(row
            .try_get::<Option<NaiveDateTime>>("", column)?
            .map(|n| n.and_utc())),
    }
}

fn read_json(row: &QueryResult, column: &str) -> Result<Option<Value>, StoreError> {
    match row.try_get::<Option<Value>>("", column) {
        Ok(v) => Ok(v),
        // JSON kept in a text column
        Err(_) => Ok(row
            .try_get::<Option<String>>("", column)?
            .and_then(|raw| serde_json::from_str(&raw).ok())),
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

impl MetadataStore {
    pub fn new(db: DatabaseConnection, schema: SchemaProfile) -> Self {
        Self {
            db,
            schema: Arc::new(schema),
            hash_locks: KeyedMutex::new(),
        }
    }

    /// Discover the `files` layout and build a store on top of it.
    pub async fn connect(db: DatabaseConnection) -> Result<Self, StoreError> {
        let schema = SchemaProfile::discover(&db).await?;
        Ok(Self::new(db, schema))
    }

    pub fn schema(&self) -> &SchemaProfile {
        &self.schema
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn read_file(&self, row: &QueryResult) -> Result<FileRecord, StoreError> {
        let schema = &self.schema;
        let opt_text = |column: &str| -> Result<Option<String>, StoreError> {
            if !schema.has(column) {
                return Ok(None);
            }
            Ok(row.try_get::<Option<String>>("", column)?)
        };
        let opt_time = |column: &str| -> Result<Option<DateTime<Utc>>, StoreError> {
            if !schema.has(column) {
                return Ok(None);
            }
            read_time(row, column)
        };
        let opt_json = |column: &str| -> Result<Option<Value>, StoreError> {
            if !schema.has(column) {
                return Ok(None);
            }
            read_json(row, column)
        };

        let id: String = row.try_get("", "id")?;
        let filename: String = row
            .try_get::<Option<String>>("", schema.name_column)?
            .unwrap_or_default();
        let mime_type: String = row
            .try_get::<Option<String>>("", "mime_type")?
            .unwrap_or_default();
        let size_bytes = match row.try_get::<Option<i64>>("", schema.size_column) {
            Ok(v) => v.unwrap_or(0),
            Err(_) => row
                .try_get::<Option<i32>>("", schema.size_column)?
                .map(i64::from)
                .unwrap_or(0),
        };
        let category = opt_text("category")?
            .and_then(|c| FileCategory::parse(&c))
            .unwrap_or_else(|| FileCategory::classify(&mime_type, &filename));
        let status: String = row.try_get("", "status")?;
        let uploaded_at = read_time(row, "uploaded_at")?
            .ok_or_else(|| StoreError::Corrupt(format!("file {} has no uploaded_at", id)))?;

        Ok(FileRecord {
            content_hash: row.try_get("", "content_hash")?,
            filename,
            current_name: opt_text("current_name")?,
            mime_type,
            size_bytes,
            category,
            storage_path: opt_text("storage_path")?,
            thumbnail_path: opt_text("thumbnail_path")?,
            status: FileStatus::parse(&status).unwrap_or(FileStatus::Pending),
            stage: opt_text("stage")?,
            description: opt_text("description")?,
            ocr_text: opt_text("ocr_text")?,
            detected_objects: string_list(opt_json("detected_objects")?),
            tags: string_list(opt_json("tags")?),
            categories: string_list(opt_json("categories")?),
            folder_path: row.try_get("", "folder_path")?,
            metadata: opt_json("metadata")?.unwrap_or_else(|| json!({})),
            uploaded_at,
            processed_at: opt_time("processed_at")?,
            last_accessed_at: opt_time("last_accessed_at")?,
            uploader_id: opt_text("uploader_id")?,
            owner_id: opt_text("owner_id")?,
            id,
        })
    }

    fn select_files(&self) -> SelectStatement {
        let mut select = Query::select();
        select
            .columns(self.schema.select_columns().into_iter().map(col))
            .from(files_table());
        select
    }

    async fn fetch_files(
        &self,
        cond: Cond,
        page: Option<(u64, u64)>,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let mut select = self.select_files();
        select
            .cond_where(cond)
            .order_by(col("uploaded_at"), Order::Desc)
            .order_by(col("id"), Order::Asc);
        if let Some((limit, offset)) = page {
            select.limit(limit).offset(offset);
        }

        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;
        rows.iter().map(|row| self.read_file(row)).collect()
    }

    async fn count_files(&self, cond: Cond) -> Result<u64, StoreError> {
        let mut select = Query::select();
        select
            .expr_as(Func::count(Expr::col(col("id"))), Alias::new("total"))
            .from(files_table())
            .cond_where(cond);

        let backend = self.db.get_database_backend();
        let total = match self.db.query_one(backend.build(&select)).await? {
            Some(row) => row.try_get::<i64>("", "total")?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    fn filter_cond(&self, filter: &FileFilter) -> Cond {
        let mut cond = Cond::all();
        if let Some(folder) = &filter.folder {
            cond = cond.add(Expr::col(col("folder_path")).eq(folder.as_str()));
        }
        if let Some(status) = filter.status {
            cond = cond.add(Expr::col(col("status")).eq(status.as_str()));
        }
        if let Some(category) = filter.category.filter(|_| self.schema.has("category")) {
            cond = cond.add(Expr::col(col("category")).eq(category.as_str()));
        }
        cond
    }

    async fn page_files(
        &self,
        cond: Cond,
        filter: &FileFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<FileRecord>, u64), StoreError> {
        let cond = cond.add(self.filter_cond(filter));

        if filter.category.is_some() && !self.schema.has("category") {
            // Category is derived on read; filter after fetching.
            let matching: Vec<FileRecord> = self
                .fetch_files(cond, None)
                .await?
                .into_iter()
                .filter(|f| filter.matches(f))
                .collect();
            let total = matching.len() as u64;
            let page = matching
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            return Ok((page, total));
        }

        let total = self.count_files(cond.clone()).await?;
        let files = self.fetch_files(cond, Some((limit, offset))).await?;
        Ok((files, total))
    }

    /// Apply column updates to one file. Columns the deployment lacks are
    /// dropped; returns whether a row was changed.
    async fn update_columns(
        &self,
        id: &str,
        sets: Vec<(&str, SqlValue)>,
        guard: Option<SimpleExpr>,
    ) -> Result<bool, StoreError> {
        let sets: Vec<(Alias, SimpleExpr)> = sets
            .into_iter()
            .filter(|(column, _)| self.schema.has(column))
            .map(|(column, value)| (col(column), SimpleExpr::Value(value)))
            .collect();
        if sets.is_empty() {
            return Ok(false);
        }

        let mut update = Query::update();
        update
            .table(files_table())
            .values(sets)
            .and_where(Expr::col(col("id")).eq(id));
        if let Some(guard) = guard {
            update.and_where(guard);
        }

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&update)).await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- files ---------------------------------------------------------

    /// Insert a file record. Unless `force` is set, a record that already
    /// carries the same `content_hash` is returned instead of a new row.
    ///
    /// Registrations of one hash are serialized: in-process by a keyed
    /// mutex, across processes on PostgreSQL by a transaction-scoped
    /// advisory lock.
    pub async fn insert_file(&self, new: NewFile, force: bool) -> Result<InsertOutcome, StoreError> {
        let backend = self.db.get_database_backend();
        let _hash_guard = if force {
            None
        } else {
            Some(self.hash_locks.lock(&new.content_hash).await)
        };
        let txn = self.db.begin().await?;

        if !force {
            if backend == DatabaseBackend::Postgres {
                txn.execute(Statement::from_sql_and_values(
                    backend,
                    "SELECT pg_advisory_xact_lock(hashtext($1))",
                    [new.content_hash.clone().into()],
                ))
                .await?;
            }

            let mut lookup = Query::select();
            lookup
                .column(col("id"))
                .from(files_table())
                .and_where(Expr::col(col("content_hash")).eq(new.content_hash.as_str()))
                .order_by(col("uploaded_at"), Order::Asc)
                .limit(1);
            if let Some(row) = txn.query_one(backend.build(&lookup)).await? {
                let id: String = row.try_get("", "id")?;
                txn.commit().await?;
                return Ok(InsertOutcome { id, created: false });
            }
        }

        let id = Uuid::new_v4().to_string();
        let category = new.category();
        let candidates: Vec<(&str, SqlValue)> = vec![
            ("id", val(id.as_str())),
            ("content_hash", val(new.content_hash.as_str())),
            (self.schema.name_column, val(new.filename.as_str())),
            ("mime_type", val(new.mime_type.as_str())),
            (self.schema.size_column, val(new.size_bytes)),
            ("category", val(category.as_str())),
            ("storage_path", val(new.storage_path.clone())),
            ("status", val(FileStatus::Pending.as_str())),
            ("stage", val("uploaded")),
            ("detected_objects", json_val(json!([]))),
            ("tags", json_val(serde_json::to_value(&new.tags)?)),
            ("categories", json_val(json!([]))),
            ("folder_path", val(new.folder_path.as_str())),
            ("metadata", json_val(new.metadata.clone())),
            ("uploaded_at", val(Utc::now())),
            ("uploader_id", val(new.uploader_id.clone())),
            ("owner_id", val(new.owner_id.clone())),
        ];
        let (columns, values): (Vec<Alias>, Vec<SimpleExpr>) = candidates
            .into_iter()
            .filter(|(column, _)| self.schema.has(column))
            .map(|(column, value)| (col(column), SimpleExpr::Value(value)))
            .unzip();

        let mut insert = Query::insert();
        insert.into_table(files_table()).columns(columns);
        insert
            .values(values)
            .map_err(|e| StoreError::Schema(e.to_string()))?;

        txn.execute(backend.build(&insert)).await?;
        txn.commit().await?;

        Ok(InsertOutcome { id, created: true })
    }

    pub async fn get_file(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let cond = Cond::all().add(Expr::col(col("id")).eq(id));
        Ok(self.fetch_files(cond, Some((1, 0))).await?.into_iter().next())
    }

    /// Records for the given ids; unknown ids are skipped.
    pub async fn get_files(&self, ids: &[String]) -> Result<Vec<FileRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cond = Cond::all().add(Expr::col(col("id")).is_in(ids.iter().map(String::as_str)));
        self.fetch_files(cond, None).await
    }

    pub async fn find_by_hash(&self, content_hash: &str) -> Result<Vec<FileRecord>, StoreError> {
        let cond = Cond::all().add(Expr::col(col("content_hash")).eq(content_hash));
        self.fetch_files(cond, None).await
    }

    /// A page of files (newest first) and the total matching count.
    pub async fn list_files(
        &self,
        filter: &FileFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<FileRecord>, u64), StoreError> {
        self.page_files(Cond::all(), filter, limit, offset).await
    }

    /// Case-insensitive substring match over names, description and
    /// extracted text.
    pub async fn search_text(
        &self,
        query: &str,
        filter: &FileFilter,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<FileRecord>, u64), StoreError> {
        let mut any = Cond::any();
        for column in [
            self.schema.name_column,
            "current_name",
            "description",
            "ocr_text",
        ] {
            if self.schema.has(column) {
                any = any.add(
                    Expr::expr(Func::lower(Expr::col(col(column)))).like(like_pattern(query)),
                );
            }
        }
        self.page_files(Cond::all().add(any), filter, limit, offset)
            .await
    }

    pub async fn ids_in_folder(&self, folder_path: &str) -> Result<Vec<String>, StoreError> {
        let mut select = Query::select();
        select
            .column(col("id"))
            .from(files_table())
            .and_where(Expr::col(col("folder_path")).eq(folder_path))
            .order_by(col("uploaded_at"), Order::Asc);

        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;
        rows.iter()
            .map(|row| row.try_get::<String>("", "id").map_err(StoreError::from))
            .collect()
    }

    pub async fn count_files_in_folder(&self, folder_path: &str) -> Result<u64, StoreError> {
        self.count_files(Cond::all().add(Expr::col(col("folder_path")).eq(folder_path)))
            .await
    }

    /// Move a file along its lifecycle. The write only happens when the
    /// current status may transition to `status`; returns whether it did.
    pub async fn update_status(
        &self,
        id: &str,
        status: FileStatus,
        stage: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut sets = vec![("status", val(status.as_str()))];
        if let Some(stage) = stage {
            sets.push(("stage", val(stage)));
        }
        match status {
            FileStatus::Completed => sets.push(("processed_at", val(Utc::now()))),
            FileStatus::Pending => sets.push(("processed_at", val(Option::<DateTime<Utc>>::None))),
            _ => {}
        }

        let allowed: Vec<&str> = status.predecessors().iter().map(|s| s.as_str()).collect();
        self.update_columns(id, sets, Some(Expr::col(col("status")).is_in(allowed)))
            .await
    }

    /// Record the most recent stage without touching status.
    pub async fn update_stage(&self, id: &str, stage: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("stage", val(stage))], None)
            .await
    }

    pub async fn update_category(&self, id: &str, category: FileCategory) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("category", val(category.as_str()))], None)
            .await
    }

    pub async fn update_description(&self, id: &str, description: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("description", val(description))], None)
            .await
    }

    pub async fn update_objects(&self, id: &str, objects: &[String]) -> Result<bool, StoreError> {
        let value = serde_json::to_value(objects)?;
        self.update_columns(id, vec![("detected_objects", json_val(value))], None)
            .await
    }

    pub async fn update_folder(&self, id: &str, folder_path: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("folder_path", val(folder_path))], None)
            .await
    }

    pub async fn update_ocr_text(&self, id: &str, text: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("ocr_text", val(text))], None)
            .await
    }

    pub async fn update_thumbnail(&self, id: &str, path: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("thumbnail_path", val(path))], None)
            .await
    }

    pub async fn touch(&self, id: &str) -> Result<bool, StoreError> {
        self.update_columns(id, vec![("last_accessed_at", val(Utc::now()))], None)
            .await
    }

    /// Delete a file record together with its suggestions.
    pub async fn delete_file(&self, id: &str) -> Result<bool, StoreError> {
        let backend = self.db.get_database_backend();
        let txn = self.db.begin().await?;

        suggestions::Entity::delete_many()
            .filter(suggestions::Column::FileId.eq(id))
            .exec(&txn)
            .await?;

        let mut delete = Query::delete();
        delete
            .from_table(files_table())
            .and_where(Expr::col(col("id")).eq(id));
        let result = txn.execute(backend.build(&delete)).await?;

        txn.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Groups of two or more files sharing a content hash, largest first.
    pub async fn list_duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let backend = self.db.get_database_backend();

        let mut groups = Query::select();
        groups
            .column(col("content_hash"))
            .expr_as(Func::count(Expr::col(col("id"))), Alias::new("group_size"))
            .from(files_table())
            .group_by_col(col("content_hash"))
            .and_having(Expr::expr(Func::count(Expr::col(col("id")))).gte(2))
            .order_by(Alias::new("group_size"), Order::Desc)
            .order_by(col("content_hash"), Order::Asc);

        let rows = self.db.query_all(backend.build(&groups)).await?;
        let hashes: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String>("", "content_hash"))
            .collect::<Result<_, _>>()?;
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let mut members = Query::select();
        members
            .columns([col("id"), col("content_hash")])
            .from(files_table())
            .and_where(Expr::col(col("content_hash")).is_in(hashes.iter().map(String::as_str)))
            .order_by(col("uploaded_at"), Order::Asc)
            .order_by(col("id"), Order::Asc);

        let mut by_hash: HashMap<String, Vec<String>> = HashMap::new();
        for row in self.db.query_all(backend.build(&members)).await? {
            let hash: String = row.try_get("", "content_hash")?;
            by_hash.entry(hash).or_default().push(row.try_get("", "id")?);
        }

        Ok(hashes
            .into_iter()
            .filter_map(|hash| {
                let file_ids = by_hash.remove(&hash)?;
                Some(DuplicateGroup {
                    size: file_ids.len(),
                    content_hash: hash,
                    file_ids,
                })
            })
            .filter(|group| group.size >= 2)
            .collect())
    }

    // ---- folders -------------------------------------------------------

    pub async fn create_folder(&self, new: NewFolder) -> Result<Folder, StoreError> {
        if folders::Entity::find_by_id(new.path.clone())
            .one(&self.db)
            .await?
            .is_some()
        {
            return Err(StoreError::AlreadyExists(format!("folder {}", new.path)));
        }

        let now = Utc::now();
        let model = folders::ActiveModel {
            path: Set(new.path),
            name: Set(new.name),
            parent_path: Set(new.parent_path),
            metadata: Set(new.metadata),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model.into())
    }

    /// Create the folder and any missing ancestors; existing ones are kept.
    pub async fn ensure_folder(&self, path: &str) -> Result<(), StoreError> {
        let mut chain = Vec::new();
        let mut current = Some(path.to_string());
        while let Some(p) = current {
            if p == "/" {
                break;
            }
            current = parent_folder(&p);
            chain.push(p);
        }

        for p in chain.into_iter().rev() {
            let now = Utc::now();
            let model = folders::ActiveModel {
                name: Set(folder_name(&p)),
                parent_path: Set(parent_folder(&p)),
                path: Set(p),
                metadata: Set(json!({})),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let result = folders::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(folders::Column::Path)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await;
            match result {
                Ok(_) | Err(DbErr::RecordNotInserted) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn get_folder(&self, path: &str) -> Result<Option<Folder>, StoreError> {
        Ok(folders::Entity::find_by_id(path.to_string())
            .one(&self.db)
            .await?
            .map(Folder::from))
    }

    pub async fn list_folders(&self, parent: Option<&str>) -> Result<Vec<Folder>, StoreError> {
        let mut query = folders::Entity::find().order_by_asc(folders::Column::Path);
        if let Some(parent) = parent {
            query = query.filter(folders::Column::ParentPath.eq(parent));
        }
        Ok(query
            .all(&self.db)
            .await?
            .into_iter()
            .map(Folder::from)
            .collect())
    }

    pub async fn update_folder_record(
        &self,
        path: &str,
        name: Option<String>,
        metadata: Option<Value>,
    ) -> Result<Folder, StoreError> {
        let existing = folders::Entity::find_by_id(path.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", path)))?;

        let mut active: folders::ActiveModel = existing.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(metadata) = metadata {
            active.metadata = Set(metadata);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?.into())
    }

    /// Delete a folder record. Refused while any file still lives in it.
    pub async fn delete_folder(&self, path: &str) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;

        if folders::Entity::find_by_id(path.to_string())
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(StoreError::NotFound(format!("folder {}", path)));
        }

        let mut count = Query::select();
        count
            .expr_as(Func::count(Expr::col(col("id"))), Alias::new("total"))
            .from(files_table())
            .and_where(Expr::col(col("folder_path")).eq(path));
        let backend = self.db.get_database_backend();
        let file_count = match txn.query_one(backend.build(&count)).await? {
            Some(row) => row.try_get::<i64>("", "total")?.max(0) as u64,
            None => 0,
        };
        if file_count > 0 {
            return Err(StoreError::FolderNotEmpty {
                path: path.to_string(),
                file_count,
            });
        }

        folders::Entity::delete_by_id(path.to_string())
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    // ---- suggestions ---------------------------------------------------

    pub async fn create_suggestion(&self, new: NewSuggestion) -> Result<Suggestion, StoreError> {
        let now = Utc::now();
        let model = suggestions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            file_id: Set(new.file_id),
            kind: Set(new.kind.as_str().to_string()),
            status: Set(new.status.as_str().to_string()),
            suggested_value: Set(new.suggested_value),
            reason: Set(new.reason),
            confidence: Set(new.confidence.clamp(0.0, 1.0)),
            sibling_ids: Set(serde_json::to_value(&new.sibling_ids)?),
            scores: Set(serde_json::to_value(&new.scores)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Suggestion::try_from(model).map_err(StoreError::Corrupt)
    }

    pub async fn get_suggestion(&self, id: &str) -> Result<Option<Suggestion>, StoreError> {
        suggestions::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(|m| Suggestion::try_from(m).map_err(StoreError::Corrupt))
            .transpose()
    }

    pub async fn list_suggestions(
        &self,
        filter: &SuggestionFilter,
    ) -> Result<Vec<Suggestion>, StoreError> {
        let mut query = suggestions::Entity::find()
            .order_by_desc(suggestions::Column::CreatedAt)
            .order_by_asc(suggestions::Column::Id);
        if let Some(file_id) = &filter.file_id {
            query = query.filter(suggestions::Column::FileId.eq(file_id.as_str()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(suggestions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(suggestions::Column::Status.eq(status.as_str()));
        }

        query
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| Suggestion::try_from(m).map_err(StoreError::Corrupt))
            .collect()
    }

    /// Whether a pending or accepted suggestion of `kind` exists for the file.
    pub async fn has_open_suggestion(
        &self,
        file_id: &str,
        kind: SuggestionKind,
    ) -> Result<bool, StoreError> {
        let found = suggestions::Entity::find()
            .filter(suggestions::Column::FileId.eq(file_id))
            .filter(suggestions::Column::Kind.eq(kind.as_str()))
            .filter(suggestions::Column::Status.is_in([
                SuggestionStatus::Pending.as_str(),
                SuggestionStatus::Accepted.as_str(),
            ]))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// Move a suggestion to `next`, enforcing the transition guard. The
    /// update is conditional on the status read, so concurrent transitions
    /// cannot both win.
    pub async fn transition_suggestion(
        &self,
        id: &str,
        next: SuggestionStatus,
    ) -> Result<Suggestion, StoreError> {
        let current = self
            .get_suggestion(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("suggestion {}", id)))?;

        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition(format!(
                "suggestion {} cannot go from {} to {}",
                id,
                current.status.as_str(),
                next.as_str()
            )));
        }

        let result = suggestions::Entity::update_many()
            .col_expr(suggestions::Column::Status, Expr::value(next.as_str()))
            .col_expr(suggestions::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(suggestions::Column::Id.eq(id))
            .filter(suggestions::Column::Status.eq(current.status.as_str()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::InvalidTransition(format!(
                "suggestion {} changed concurrently",
                id
            )));
        }

        self.get_suggestion(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("suggestion {}", id)))
    }
}
