//! API layer - HTTP handlers and routing
//!
//! - JSON API under `/api/v1` (public, authenticated and admin-only routes)
//! - Installation wizard under `/api/v1/install`
//! - Public HTML site and `/uploads` static files

pub mod accounts;
pub mod auth;
pub mod common;
pub mod docs;
pub mod html;
pub mod install;
pub mod media;
pub mod middleware;
pub mod nav;
pub mod newsletter;
pub mod pages;
pub mod posts;
pub mod responses;
pub mod site;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}, services::ServeDir, trace::TraceLayer};

pub use install::InstallState;
pub use middleware::{ApiError, AppState, AuthenticatedUser};
pub use responses::ApiResponse;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin-only routes
    let admin_routes = Router::new()
        .nest("/admin/accounts", accounts::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    // Any signed-in account
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/admin/posts", posts::admin_router())
        .nest("/admin/pages", pages::admin_router())
        .nest("/admin/docs", docs::admin_router())
        .nest("/admin/nav", nav::router())
        .nest("/admin/media", media::router(state.config.upload.max_file_size))
        .nest("/admin/newsletter", newsletter::admin_router())
        .nest("/admin", site::admin_router())
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(site::public_router())
        .nest("/posts", posts::public_router())
        .nest("/pages", pages::public_router())
        .nest("/docs", docs::public_router())
        .nest("/newsletter", newsletter::public_router())
        .nest("/auth", auth::public_router())
        .nest("/install", install::installed_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    // credentials cannot be combined with a wildcard origin
    if cors_origin == "*" {
        return cors.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!("Invalid CORS origin '{}', cross-origin requests are disabled", cors_origin);
            cors
        }
    }
}

/// Build the complete router for an installed site
pub fn build_router(state: AppState) -> Router {
    let upload_dir = state.config.upload.path.clone();
    let cors_origin = state.config.server.cors_origin.clone();

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()).fallback(api_not_found))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .merge(html::router())
        .fallback(html::not_found)
        .layer(cors_layer(&cors_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router served before installation
pub fn build_install_router(wizard: InstallState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api/v1/install", install::router())
        .fallback(install::not_installed)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(wizard)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("No such endpoint")
}
