pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::SecurityConfig;
use crate::services::adapters::Adapters;
use crate::services::metadata_store::MetadataStore;
use crate::services::queue::JobQueue;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::files::create_file,
        api::handlers::files::list_files,
        api::handlers::files::get_file,
        api::handlers::files::delete_file,
        api::handlers::files::process_file,
        api::handlers::files::processing_status,
        api::handlers::search::search,
        api::handlers::search::search_get,
        api::handlers::organize::organize,
        api::handlers::organize::find_duplicates,
        api::handlers::folders::create_folder,
        api::handlers::folders::list_folders,
        api::handlers::folders::get_folder,
        api::handlers::folders::update_folder,
        api::handlers::folders::delete_folder,
        api::handlers::suggestions::list_suggestions,
        api::handlers::suggestions::update_suggestion,
        api::handlers::suggestions::apply_suggestion,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::files::CreateFileRequest,
            api::handlers::files::CreateFileResponse,
            api::handlers::files::FileListResponse,
            api::handlers::files::ProcessResponse,
            api::handlers::files::ProcessingStatusResponse,
            api::handlers::search::SearchType,
            api::handlers::search::SearchRequest,
            api::handlers::search::SearchResponse,
            api::handlers::organize::OrganizeRequest,
            api::handlers::organize::OrganizeResponse,
            api::handlers::organize::DuplicatesResponse,
            api::handlers::folders::CreateFolderRequest,
            api::handlers::folders::UpdateFolderRequest,
            api::handlers::suggestions::UpdateSuggestionRequest,
            models::FileRecord,
            models::FileCategory,
            models::FileStatus,
            models::FileFilter,
            models::Folder,
            models::DuplicateGroup,
            models::OrganizeStrategy,
            models::Suggestion,
            models::SuggestionKind,
            models::SuggestionStatus,
        )
    ),
    tags(
        (name = "system", description = "Health"),
        (name = "files", description = "File registration and lifecycle"),
        (name = "search", description = "Text and vector search"),
        (name = "organize", description = "Organization and duplicate detection"),
        (name = "folders", description = "Folder records"),
        (name = "suggestions", description = "Duplicate, similarity and organization suggestions")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: MetadataStore,
    pub queue: JobQueue,
    pub adapters: Adapters,
    pub security: SecurityConfig,
    pub started_at: DateTime<Utc>,
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{files, folders, health, organize, search, suggestions};

    let api_routes = Router::new()
        .route("/files", get(files::list_files).post(files::create_file))
        .route("/files/:id", get(files::get_file).delete(files::delete_file))
        .route("/files/:id/process", post(files::process_file))
        .route("/processing-status/:id", get(files::processing_status))
        .route("/search", get(search::search_get).post(search::search))
        .route("/organize", post(organize::organize))
        .route("/find-duplicates", post(organize::find_duplicates))
        .route(
            "/folders",
            get(folders::list_folders).post(folders::create_folder),
        )
        .route(
            "/folders/*path",
            get(folders::get_folder)
                .put(folders::update_folder)
                .delete(folders::delete_folder),
        )
        .route("/suggestions", get(suggestions::list_suggestions))
        .route("/suggestions/:id", axum::routing::put(suggestions::update_suggestion))
        .route("/suggestions/:id/apply", post(suggestions::apply_suggestion))
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.security))
        .with_state(state)
}
