use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};

use super::PageParams;
use super::files::parse_filter;
use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::models::{FileCategory, FileFilter, FileRecord};

/// Minimum cosine similarity for semantic and visual hits.
pub const SEMANTIC_MIN_SCORE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Text,
    Semantic,
    Visual,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    #[serde(rename = "type", default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub filters: FileFilter,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub folder: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub files: Vec<FileRecord>,
    pub total_results: u64,
    pub search_time_seconds: f64,
    pub search_type: SearchType,
}

#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results", body = SearchResponse),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Embedding service failed")
    ),
    security(("jwt" = [])),
    tag = "search"
)]
pub async fn search(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let page = PageParams {
        limit: req.limit,
        offset: req.offset,
    };
    let mut filter = req.filters;
    if let Some(folder) = filter.folder.take() {
        filter.folder = Some(crate::utils::validation::normalize_folder_path(&folder)?);
    }
    run_search(&state, &req.query, req.search_type, filter, page).await
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Text search results", body = SearchResponse),
        (status = 400, description = "Missing q")
    ),
    security(("jwt" = [])),
    tag = "search"
)]
pub async fn search_get(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = query
        .q
        .ok_or_else(|| AppError::BadRequest("query parameter q is required".to_string()))?;
    let filter = parse_filter(
        query.folder.as_deref(),
        query.file_type.as_deref(),
        query.status.as_deref(),
    )?;
    let page = PageParams {
        limit: query.limit,
        offset: query.offset,
    };
    run_search(&state, &q, SearchType::Text, filter, page).await
}

async fn run_search(
    state: &AppState,
    query: &str,
    search_type: SearchType,
    mut filter: FileFilter,
    page: PageParams,
) -> Result<Json<SearchResponse>, AppError> {
    let started = Instant::now();
    let (limit, offset) = page.resolve()?;
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("query cannot be empty".to_string()));
    }

    if search_type == SearchType::Visual {
        filter.category = Some(FileCategory::Image);
    }

    let effective = match (search_type, state.adapters.embedder.is_some()) {
        (SearchType::Text, _) => SearchType::Text,
        (other, true) => other,
        (other, false) => {
            warn!("No embedder configured; {:?} search falls back to text", other);
            SearchType::Text
        }
    };

    let (files, total_results) = match effective {
        SearchType::Text => state.store.search_text(query, &filter, limit, offset).await?,
        SearchType::Semantic | SearchType::Visual => {
            vector_search(state, query, &filter, limit, offset).await?
        }
    };

    let elapsed = started.elapsed().as_secs_f64();
    debug!(
        "Search {:?} for {:?} returned {} of {} in {:.3}s",
        effective,
        query,
        files.len(),
        total_results,
        elapsed
    );

    Ok(Json(SearchResponse {
        files,
        total_results,
        search_time_seconds: elapsed,
        search_type: effective,
    }))
}

/// Nearest neighbours of the query embedding, filtered after the lookup and
/// paged in score order.
async fn vector_search(
    state: &AppState,
    query: &str,
    filter: &FileFilter,
    limit: u64,
    offset: u64,
) -> Result<(Vec<FileRecord>, u64), AppError> {
    let Some(embedder) = state.adapters.embedder.as_ref() else {
        return Ok((Vec::new(), 0));
    };
    let vector = embedder.embed(query).await?;

    let window = usize::try_from(offset + limit).unwrap_or(usize::MAX);
    let hits = state
        .adapters
        .vector_index
        .search(&vector, window.saturating_mul(4), SEMANTIC_MIN_SCORE, &[])
        .await?;

    let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
    let mut by_id: HashMap<String, FileRecord> = state
        .store
        .get_files(&ids)
        .await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let ranked: Vec<FileRecord> = hits
        .iter()
        .filter_map(|hit| by_id.remove(&hit.id))
        .filter(|file| filter.matches(file))
        .collect();
    let total = ranked.len() as u64;
    let files = ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Ok((files, total))
}
