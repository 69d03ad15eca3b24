//! Shared application router builder.
//!
//! Both the production binary (`main.rs`) and integration tests use the
//! same middleware stack by building the router here.

use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. CORS
/// 2. Set request ID on incoming requests
/// 3. Structured request/response tracing
/// 4. Propagate request ID to response
/// 5. Request timeout
/// 6. Panic recovery (catch panics, return 500)
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config);
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/websocket", get(ws::ws_handler))
        // Projects
        .route(
            "/projects",
            post(handlers::project::create).get(handlers::project::list),
        )
        .route(
            "/projects/{project}",
            get(handlers::project::get_by_name).delete(handlers::project::delete),
        )
        .route(
            "/projects/{project}/permissions",
            axum::routing::put(handlers::permissions::grant),
        )
        // Versions
        .route(
            "/projects/{project}/versions",
            get(handlers::project_version::list).post(handlers::project_version::create),
        )
        .route(
            "/projects/{project}/{version}",
            get(handlers::project_version::get)
                .put(handlers::project_version::edit)
                .delete(handlers::project_version::delete),
        )
        .route(
            "/projects/{project}/{version}/clone",
            post(handlers::project_version::clone),
        )
        .route(
            "/projects/{project}/{version}/snapshot",
            post(handlers::project_version::snapshot),
        )
        .route(
            "/projects/{project}/{version}/lock",
            post(handlers::project_version::lock),
        )
        .route(
            "/projects/{project}/{version}/aptsources",
            get(handlers::project_version::apt_sources),
        )
        .route(
            "/projects/{project}/{version}/dependents",
            get(handlers::project_version::dependents),
        )
        .route(
            "/projects/{project}/{version}/repository/{repo_id}",
            delete(handlers::source_repository::remove),
        )
        // Dependencies
        .route(
            "/projects/{project}/{version}/dependencies",
            get(handlers::dependency::list).post(handlers::dependency::add),
        )
        .route(
            "/projects/{project}/{version}/dependency/{dep_project}/{dep_version}",
            delete(handlers::dependency::remove),
        )
}

async fn health() -> &'static str {
    "ok"
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour: misconfiguration should fail fast.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}
