use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services: identity, configuration, errors, persistence, object storage.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage;

// Post visibility, listing and authorization.
pub mod guard;
pub mod listing;
pub mod visibility;

// HTTP surface.
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::Viewer;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema` models.
/// Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_index, handlers::get_category_posts, handlers::get_profile,
        handlers::get_post_detail, handlers::get_categories, handlers::get_locations,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::add_comment, handlers::update_comment, handlers::delete_comment,
        handlers::update_profile, handlers::get_me, handlers::register_user,
        handlers::get_presigned_url, handlers::about_page, handlers::rules_page
    ),
    components(
        schemas(
            models::User, models::Category, models::Location, models::Post, models::Comment,
            models::AuthorSummary, models::CategorySummary, models::LocationSummary,
            models::PostView, models::PostPage, models::PostDetail, models::CategoryPosts,
            models::ProfilePosts, models::StaticPage, models::CreatePostRequest,
            models::UpdatePostRequest, models::CreateCommentRequest, models::UpdateCommentRequest,
            models::UpdateProfileRequest, models::RegisterUserRequest,
            models::PresignedUrlRequest, models::PresignedUrlResponse,
        )
    ),
    tags(
        (name = "blogicum", description = "Blogicum blogging API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, cloneable container of every service a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Entity Store: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Object storage for post images.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` and `Viewer` pull single services out of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for `authenticated_routes`. Extracting `AuthUser` rejects the request with
/// 401 before the handler runs when credentials are missing or invalid.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routers, middleware and state into the application service.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Method routers on shared paths (e.g. /posts/{post_id}) are merged; the auth layer
        // only wraps the methods registered here.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` set by the layer above,
/// so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
