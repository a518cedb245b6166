//! Page API endpoints
//!
//! Pages are built from blocks and rendered to HTML on save.
//! - GET /api/v1/pages/{slug} - A published page
//! - GET/POST /api/v1/admin/pages, GET/PUT/DELETE /api/v1/admin/pages/{id}

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};

use crate::api::common::AdminListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{CreatePageInput, Page, UpdatePageInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pages).post(create_page))
        .route("/{id}", get(get_page).put(update_page).delete(delete_page))
}

async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Page>>, ApiError> {
    Ok(ApiResponse::ok(state.page_service.get_published_by_slug(&slug).await?))
}

async fn list_pages(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<Vec<Page>>>, ApiError> {
    Ok(ApiResponse::ok(state.page_service.list(query.status()?).await?))
}

async fn create_page(State(state): State<AppState>, Json(input): Json<CreatePageInput>) -> Result<Response, ApiError> {
    Ok(ApiResponse::created(state.page_service.create(input).await?))
}

async fn get_page(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<Page>>, ApiError> {
    Ok(ApiResponse::ok(state.page_service.get(id).await?))
}

async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePageInput>,
) -> Result<Json<ApiResponse<Page>>, ApiError> {
    Ok(ApiResponse::ok(state.page_service.update(id, input).await?))
}

async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.page_service.delete(id).await?;
    Ok(MessageResponse::new("Page deleted"))
}
