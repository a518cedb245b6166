//! Installation wizard API
//!
//! While the server is not installed only these routes are served
//! (`/api/v1/install/*`); everything else answers `503 NOT_INSTALLED`.
//! Once installed, the same paths answer `403 FORBIDDEN`.
//!
//! - GET /status
//! - POST /database `{ driver, url }`
//! - POST /migrate
//! - POST /site `SiteSettings`
//! - POST /admin `{ email, display_name }`
//! - POST /finish

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::middleware::ApiError;
use crate::api::responses::ApiResponse;
use crate::config::DatabaseDriver;
use crate::db::migrations::MigrationReport;
use crate::models::Account;
use crate::services::{InstallStatus, InstallWizard, SiteSettings};

pub type InstallState = Arc<InstallWizard>;

#[derive(Debug, Deserialize)]
pub struct DatabaseRequest {
    #[serde(default)]
    pub driver: DatabaseDriver,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub message: &'static str,
}

/// Routes served in install mode, relative to `/api/v1/install`
pub fn router() -> Router<InstallState> {
    Router::new()
        .route("/status", get(status))
        .route("/database", post(configure_database))
        .route("/migrate", post(run_migrations))
        .route("/site", post(configure_site))
        .route("/admin", post(create_admin))
        .route("/finish", post(finish))
}

/// Routes served once installed: every wizard path is refused
pub fn installed_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/", any(already_installed))
        .route("/{*rest}", any(already_installed))
}

async fn already_installed() -> ApiError {
    ApiError::forbidden("NotWP is already installed")
}

/// Fallback for every non-wizard request in install mode
pub async fn not_installed() -> Response {
    ApiError::new("NOT_INSTALLED", "NotWP is not installed yet; use /api/v1/install").into_response()
}

async fn status(State(wizard): State<InstallState>) -> Json<ApiResponse<InstallStatus>> {
    ApiResponse::ok(wizard.status().await)
}

async fn configure_database(
    State(wizard): State<InstallState>,
    Json(body): Json<DatabaseRequest>,
) -> Result<Json<ApiResponse<InstallStatus>>, ApiError> {
    Ok(ApiResponse::ok(wizard.configure_database(body.driver, &body.url).await?))
}

async fn run_migrations(State(wizard): State<InstallState>) -> Result<Json<ApiResponse<MigrationReport>>, ApiError> {
    Ok(ApiResponse::ok(wizard.run_migrations().await?))
}

async fn configure_site(
    State(wizard): State<InstallState>,
    Json(site): Json<SiteSettings>,
) -> Result<Json<ApiResponse<InstallStatus>>, ApiError> {
    Ok(ApiResponse::ok(wizard.configure_site(site).await?))
}

async fn create_admin(
    State(wizard): State<InstallState>,
    Json(body): Json<AdminRequest>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    Ok(ApiResponse::ok(wizard.create_admin(&body.email, &body.display_name).await?))
}

async fn finish(State(wizard): State<InstallState>) -> Result<Json<ApiResponse<FinishResponse>>, ApiError> {
    wizard.finish().await?;
    Ok(ApiResponse::ok(FinishResponse {
        message: "Installation complete, the server is restarting",
    }))
}
