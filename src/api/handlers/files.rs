use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::PageParams;
use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::models::{FileCategory, FileFilter, FileRecord, FileStatus, NewFile, Stage};
use crate::services::queue::EnqueueOutcome;
use crate::utils::auth::Claims;
use crate::utils::validation::{normalize_folder_path, sanitize_filename, validate_content_hash};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateFileRequest {
    #[validate(length(min = 1, max = 255, message = "filename must be 1-255 characters"))]
    pub filename: String,
    #[validate(length(max = 255, message = "mime_type is too long"))]
    pub mime_type: String,
    #[validate(range(min = 0, message = "size_bytes must not be negative"))]
    pub size_bytes: i64,
    pub content_hash: String,
    /// Required for images, documents and audio; their mandatory stages
    /// read the content.
    pub storage_path: Option<String>,
    /// Defaults to the root folder.
    pub folder_path: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub tags: Option<Vec<String>>,
    /// Insert a new record even when the hash is already known.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateFileResponse {
    pub id: String,
    /// True when an existing record with the same hash was returned.
    pub existing: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListFilesQuery {
    pub folder: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessingStatusResponse {
    pub file_id: String,
    pub status: FileStatus,
    pub stage: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessResponse {
    pub file_id: String,
    pub status: FileStatus,
    pub queued: bool,
}

/// Parse the `folder`, `type` and `status` filter values shared by listing
/// and search.
pub fn parse_filter(
    folder: Option<&str>,
    file_type: Option<&str>,
    status: Option<&str>,
) -> Result<FileFilter, AppError> {
    let folder = folder.map(normalize_folder_path).transpose()?;
    let category = file_type
        .map(|t| {
            FileCategory::parse(t)
                .ok_or_else(|| AppError::BadRequest(format!("unknown file type '{}'", t)))
        })
        .transpose()?;
    let status = status
        .map(|s| {
            FileStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status '{}'", s)))
        })
        .transpose()?;
    Ok(FileFilter {
        folder,
        category,
        status,
    })
}

/// Categories whose mandatory stage cannot run without the stored bytes.
pub fn requires_content(category: FileCategory) -> bool {
    matches!(
        category,
        FileCategory::Image | FileCategory::Document | FileCategory::Audio
    )
}

async fn require_file(state: &AppState, id: &str) -> Result<FileRecord, AppError> {
    state
        .store
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file {} not found", id)))
}

#[utoipa::path(
    post,
    path = "/api/files",
    request_body = CreateFileRequest,
    responses(
        (status = 201, description = "File registered", body = CreateFileResponse),
        (status = 400, description = "Invalid request")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn create_file(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    ApiJson(req): ApiJson<CreateFileRequest>,
) -> Result<(StatusCode, Json<CreateFileResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_content_hash(&req.content_hash)?;
    let filename = sanitize_filename(&req.filename)?;
    let folder_path = normalize_folder_path(req.folder_path.as_deref().unwrap_or("/"))?;
    let metadata = match req.metadata {
        None | Some(Value::Null) => json!({}),
        Some(Value::Object(map)) => Value::Object(map),
        Some(_) => return Err(AppError::BadRequest("metadata must be an object".to_string())),
    };
    let storage_path = req.storage_path.filter(|p| !p.trim().is_empty());
    let category = FileCategory::classify(&req.mime_type, &filename);
    if storage_path.is_none() && requires_content(category) {
        return Err(AppError::BadRequest(format!(
            "storage_path is required for {} files",
            category.as_str()
        )));
    }
    let user_id = claims.map(|Extension(c)| c.sub);

    if folder_path != "/" {
        state.store.ensure_folder(&folder_path).await?;
    }

    let outcome = state
        .store
        .insert_file(
            NewFile {
                filename,
                mime_type: req.mime_type.trim().to_string(),
                size_bytes: req.size_bytes,
                content_hash: req.content_hash,
                storage_path,
                folder_path,
                metadata,
                tags: req.tags.unwrap_or_default(),
                uploader_id: user_id.clone(),
                owner_id: user_id,
            },
            req.force,
        )
        .await?;

    if outcome.created {
        info!("📤 Registered file {}", outcome.id);
        if state.queue.submit(&outcome.id, Stage::Ingest).await == EnqueueOutcome::Dropped {
            warn!("Ingest for {} could not be queued", outcome.id);
        }
    } else {
        info!("♻️  Hash already known, returning file {}", outcome.id);
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateFileResponse {
            id: outcome.id,
            existing: !outcome.created,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "A page of files", body = FileListResponse),
        (status = 400, description = "Invalid paging or filter")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListFilesQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let (limit, offset) = PageParams {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve()?;
    let filter = parse_filter(
        query.folder.as_deref(),
        query.file_type.as_deref(),
        query.status.as_deref(),
    )?;

    let (files, total) = state.store.list_files(&filter, limit, offset).await?;
    Ok(Json(FileListResponse {
        files,
        total,
        limit,
        offset,
    }))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File record", body = FileRecord),
        (status = 404, description = "Unknown file")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let file = require_file(&state, &id).await?;
    if let Err(e) = state.store.touch(&id).await {
        warn!("Failed to record access to {}: {}", id, e);
    }
    Ok(Json(file))
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "Unknown file")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_file(&id).await? {
        return Err(AppError::NotFound(format!("file {} not found", id)));
    }
    if let Err(e) = state.adapters.vector_index.delete(&id).await {
        warn!("Failed to drop embedding for {}: {}", id, e);
    }
    info!("🗑️ Deleted file {}", id);
    Ok(Json(json!({ "deleted": id })))
}

#[utoipa::path(
    post,
    path = "/api/files/{id}/process",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File re-queued for processing", body = ProcessResponse),
        (status = 404, description = "Unknown file")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn process_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessResponse>, AppError> {
    require_file(&state, &id).await?;
    state
        .store
        .update_status(&id, FileStatus::Pending, Some("queued"))
        .await?;
    let outcome = state.queue.submit(&id, Stage::Ingest).await;

    Ok(Json(ProcessResponse {
        file_id: id,
        status: FileStatus::Pending,
        queued: outcome != EnqueueOutcome::Dropped,
    }))
}

#[utoipa::path(
    get,
    path = "/api/processing-status/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "Processing status", body = ProcessingStatusResponse),
        (status = 404, description = "Unknown file")
    ),
    security(("jwt" = [])),
    tag = "files"
)]
pub async fn processing_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessingStatusResponse>, AppError> {
    let file = require_file(&state, &id).await?;
    Ok(Json(ProcessingStatusResponse {
        file_id: file.id,
        status: file.status,
        stage: file.stage,
        processed_at: file.processed_at,
    }))
}
