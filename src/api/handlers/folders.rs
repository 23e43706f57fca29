use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::models::{Folder, NewFolder};
use crate::utils::validation::{folder_name, normalize_folder_path, parent_folder};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub path: String,
    pub name: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListFoldersQuery {
    /// Only direct children of this folder.
    pub parent: Option<String>,
}

fn folder_path(raw: &str) -> Result<String, AppError> {
    let path = normalize_folder_path(raw)?;
    if path == "/" {
        return Err(AppError::BadRequest(
            "the root folder cannot be managed".to_string(),
        ));
    }
    Ok(path)
}

fn object_metadata(metadata: Option<Value>) -> Result<Option<Value>, AppError> {
    match metadata {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(Value::Object(map))),
        Some(_) => Err(AppError::BadRequest("metadata must be an object".to_string())),
    }
}

fn display_name(name: Option<String>) -> Result<Option<String>, AppError> {
    match name.map(|n| n.trim().to_string()) {
        Some(n) if n.is_empty() => Err(AppError::BadRequest("name cannot be empty".to_string())),
        Some(n) if n.len() > 255 => Err(AppError::BadRequest("name is too long".to_string())),
        other => Ok(other),
    }
}

#[utoipa::path(
    post,
    path = "/api/folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = Folder),
        (status = 400, description = "Invalid path"),
        (status = 409, description = "Folder already exists")
    ),
    security(("jwt" = [])),
    tag = "folders"
)]
pub async fn create_folder(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Folder>), AppError> {
    let path = folder_path(&req.path)?;
    let name = display_name(req.name)?.unwrap_or_else(|| folder_name(&path));
    let metadata = object_metadata(req.metadata)?.unwrap_or_else(|| json!({}));
    let parent_path = parent_folder(&path);

    if let Some(parent) = parent_path.as_deref().filter(|p| *p != "/") {
        state.store.ensure_folder(parent).await?;
    }

    let folder = state
        .store
        .create_folder(NewFolder {
            path,
            name,
            parent_path,
            metadata,
        })
        .await?;
    info!("📁 Created folder {}", folder.path);
    Ok((StatusCode::CREATED, Json(folder)))
}

#[utoipa::path(
    get,
    path = "/api/folders",
    params(ListFoldersQuery),
    responses(
        (status = 200, description = "Folders", body = Vec<Folder>)
    ),
    security(("jwt" = [])),
    tag = "folders"
)]
pub async fn list_folders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListFoldersQuery>,
) -> Result<Json<Vec<Folder>>, AppError> {
    let parent = query.parent.as_deref().map(normalize_folder_path).transpose()?;
    Ok(Json(state.store.list_folders(parent.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/folders/{path}",
    params(("path" = String, Path, description = "URL-encoded folder path, e.g. %2Fx")),
    responses(
        (status = 200, description = "Folder", body = Folder),
        (status = 404, description = "Unknown folder")
    ),
    security(("jwt" = [])),
    tag = "folders"
)]
pub async fn get_folder(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Folder>, AppError> {
    let path = folder_path(&raw)?;
    state
        .store
        .get_folder(&path)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("folder {} not found", path)))
}

#[utoipa::path(
    put,
    path = "/api/folders/{path}",
    params(("path" = String, Path, description = "URL-encoded folder path")),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, description = "Folder updated", body = Folder),
        (status = 404, description = "Unknown folder")
    ),
    security(("jwt" = [])),
    tag = "folders"
)]
pub async fn update_folder(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    ApiJson(req): ApiJson<UpdateFolderRequest>,
) -> Result<Json<Folder>, AppError> {
    let path = folder_path(&raw)?;
    let name = display_name(req.name)?;
    let metadata = object_metadata(req.metadata)?;
    Ok(Json(
        state
            .store
            .update_folder_record(&path, name, metadata)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/folders/{path}",
    params(("path" = String, Path, description = "URL-encoded folder path")),
    responses(
        (status = 200, description = "Folder deleted"),
        (status = 400, description = "Folder still holds files"),
        (status = 404, description = "Unknown folder")
    ),
    security(("jwt" = [])),
    tag = "folders"
)]
pub async fn delete_folder(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, AppError> {
    let path = folder_path(&raw)?;
    state.store.delete_folder(&path).await?;
    info!("🗑️ Deleted folder {}", path);
    Ok(Json(json!({ "deleted": path })))
}
