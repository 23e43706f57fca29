use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::models::{Suggestion, SuggestionFilter, SuggestionKind, SuggestionStatus};
use crate::utils::validation::normalize_folder_path;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSuggestionRequest {
    pub status: SuggestionStatus,
}

#[utoipa::path(
    get,
    path = "/api/suggestions",
    params(
        ("file_id" = Option<String>, Query, description = "Target file"),
        ("kind" = Option<SuggestionKind>, Query, description = "duplicate, similar or organization"),
        ("status" = Option<SuggestionStatus>, Query, description = "pending, accepted, rejected or applied")
    ),
    responses(
        (status = 200, description = "Suggestions, newest first", body = Vec<Suggestion>)
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn list_suggestions(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SuggestionFilter>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    Ok(Json(state.store.list_suggestions(&filter).await?))
}

#[utoipa::path(
    put,
    path = "/api/suggestions/{id}",
    params(("id" = String, Path, description = "Suggestion ID")),
    request_body = UpdateSuggestionRequest,
    responses(
        (status = 200, description = "Suggestion updated", body = Suggestion),
        (status = 404, description = "Unknown suggestion"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn update_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateSuggestionRequest>,
) -> Result<Json<Suggestion>, AppError> {
    Ok(Json(
        state.store.transition_suggestion(&id, req.status).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/suggestions/{id}/apply",
    params(("id" = String, Path, description = "Suggestion ID")),
    responses(
        (status = 200, description = "Suggestion applied", body = Suggestion),
        (status = 404, description = "Unknown suggestion or file"),
        (status = 409, description = "Suggestion already resolved")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn apply_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Suggestion>, AppError> {
    let suggestion = state
        .store
        .get_suggestion(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("suggestion {} not found", id)))?;

    if !suggestion.status.can_transition_to(SuggestionStatus::Applied) {
        return Err(AppError::Conflict(format!(
            "suggestion {} is already {}",
            id,
            suggestion.status.as_str()
        )));
    }

    if suggestion.kind == SuggestionKind::Organization {
        let folder = normalize_folder_path(&suggestion.suggested_value)?;
        if state.store.get_file(&suggestion.file_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "file {} not found",
                suggestion.file_id
            )));
        }
        state.store.ensure_folder(&folder).await?;
        state.store.update_folder(&suggestion.file_id, &folder).await?;
        info!("📁 Moved {} to {}", suggestion.file_id, folder);
    }

    Ok(Json(
        state
            .store
            .transition_suggestion(&id, SuggestionStatus::Applied)
            .await?,
    ))
}
