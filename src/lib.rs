use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mapper;
pub mod models;
pub mod password;
pub mod repository;
pub mod security;
pub mod seed;
pub mod service;

// Routers grouped by required access (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use password::PasswordEncoder;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use security::SecurityPolicy;
pub use service::UserService;

/// ApiDoc
///
/// OpenAPI document for the REST surface, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_admin_current_user, handlers::get_all_users, handlers::add_user,
        handlers::update_user, handlers::delete_user, handlers::get_current_user
    ),
    components(schemas(models::UserDto, models::RoleDto)),
    tags((name = "admin-panel", description = "User administration API"))
)]
struct ApiDoc;

/// AppState
///
/// The single, cheaply clonable container shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Raw store access. The seed loader and health tooling use it directly.
    pub repo: RepositoryState,
    /// Business logic over `repo`, with the configured password encoder.
    pub users: UserService,
    /// URL access rules enforced by `security::enforce_access`.
    pub policy: Arc<SecurityPolicy>,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the service layer on top of `repo` using the encoder selected by `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let users = UserService::new(repo.clone(), PasswordEncoder::from_config(&config));
        Self {
            repo,
            users,
            policy: Arc::new(SecurityPolicy::default()),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(app_state: &AppState) -> UserService {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route, the static asset services, the access-control middleware
/// and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");
    let static_dir = std::path::Path::new(&state.config.static_dir);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        .nest_service("/css", ServeDir::new(static_dir.join("css")))
        .nest_service("/favIcon", ServeDir::new(static_dir.join("favIcon")))
        // Every request, including unknown paths, passes the URL policy first.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::enforce_access,
        ))
        .with_state(state);

    base_router.layer(
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
}

/// trace_span_logger
///
/// Span for one HTTP request, correlated by the `x-request-id` header.
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
