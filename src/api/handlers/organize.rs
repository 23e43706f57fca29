use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::ApiJson;
use crate::models::{DuplicateGroup, OrganizeStrategy, Stage};
use crate::services::queue::EnqueueOutcome;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrganizeRequest {
    /// Files to organize; empty means every file in the root folder.
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub strategy: OrganizeStrategy,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizeResponse {
    pub strategy: OrganizeStrategy,
    pub queued: usize,
    pub file_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicatesResponse {
    pub groups: Vec<DuplicateGroup>,
    pub total_groups: usize,
}

#[utoipa::path(
    post,
    path = "/api/organize",
    request_body = OrganizeRequest,
    responses(
        (status = 200, description = "Organize jobs queued", body = OrganizeResponse),
        (status = 404, description = "Unknown file id")
    ),
    security(("jwt" = [])),
    tag = "organize"
)]
pub async fn organize(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<OrganizeRequest>,
) -> Result<Json<OrganizeResponse>, AppError> {
    let file_ids = if req.file_ids.is_empty() {
        state.store.ids_in_folder("/").await?
    } else {
        let found = state.store.get_files(&req.file_ids).await?;
        let missing: Vec<&str> = req
            .file_ids
            .iter()
            .filter(|id| !found.iter().any(|f| &f.id == *id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::NotFound(format!(
                "unknown file id(s): {}",
                missing.join(", ")
            )));
        }
        req.file_ids
    };

    let mut queued = 0;
    for id in &file_ids {
        let stage = Stage::Organize {
            strategy: req.strategy,
        };
        if state.queue.submit(id, stage).await != EnqueueOutcome::Dropped {
            queued += 1;
        }
    }
    info!(
        "🗂️ Queued {} organize job(s) ({})",
        queued,
        req.strategy.as_str()
    );

    Ok(Json(OrganizeResponse {
        strategy: req.strategy,
        queued,
        file_ids,
    }))
}

#[utoipa::path(
    post,
    path = "/api/find-duplicates",
    responses(
        (status = 200, description = "Groups of files sharing a content hash", body = DuplicatesResponse)
    ),
    security(("jwt" = [])),
    tag = "organize"
)]
pub async fn find_duplicates(
    State(state): State<AppState>,
) -> Result<Json<DuplicatesResponse>, AppError> {
    let groups = state.store.list_duplicate_groups().await?;
    Ok(Json(DuplicatesResponse {
        total_groups: groups.len(),
        groups,
    }))
}
