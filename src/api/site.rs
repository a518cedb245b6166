//! Site information and settings API
//!
//! - GET /api/v1/site - Public site settings
//! - GET /api/v1/nav - Visible navigation tree
//! - GET/PUT /api/v1/admin/settings - Edit site settings
//! - POST /api/v1/admin/preview - Render Markdown for the editor preview

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiResponse;
use crate::models::NavItemTree;
use crate::services::{SiteSettings, UpdateSiteSettingsInput};

/// Public site info
#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    #[serde(flatten)]
    pub settings: SiteSettings,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/site", get(get_site_info))
        .route("/nav", get(get_nav))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/preview", post(render_preview))
}

/// GET /api/v1/site
async fn get_site_info(State(state): State<AppState>) -> Result<Json<ApiResponse<SiteInfoResponse>>, ApiError> {
    let settings = state.settings_service.get_site_settings().await?;
    Ok(ApiResponse::ok(SiteInfoResponse {
        settings,
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/v1/nav
async fn get_nav(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<NavItemTree>>>, ApiError> {
    Ok(ApiResponse::ok(state.nav_service.list_visible_tree().await?))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<ApiResponse<SiteSettings>>, ApiError> {
    Ok(ApiResponse::ok(state.settings_service.get_site_settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(input): Json<UpdateSiteSettingsInput>,
) -> Result<Json<ApiResponse<SiteSettings>>, ApiError> {
    let settings = state.settings_service.patch_site_settings(input).await?;
    tracing::info!("Site settings updated");
    Ok(ApiResponse::ok(settings))
}

async fn render_preview(
    State(state): State<AppState>,
    Json(body): Json<RenderRequest>,
) -> Json<ApiResponse<RenderResponse>> {
    let html = state.post_service.render_preview(&body.content);
    ApiResponse::ok(RenderResponse { html })
}
