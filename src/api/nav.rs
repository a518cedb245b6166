//! Navigation API endpoints (authenticated)
//!
//! - GET/POST /api/v1/admin/nav
//! - GET /api/v1/admin/nav/tree
//! - PUT /api/v1/admin/nav/order
//! - GET/PUT/DELETE /api/v1/admin/nav/{id}

use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{CreateNavItemInput, NavItem, NavItemTree, UpdateNavItemInput, UpdateNavOrderInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_nav_items).post(create_nav_item))
        .route("/tree", get(list_nav_tree))
        .route("/order", put(update_nav_order))
        .route("/{id}", get(get_nav_item).put(update_nav_item).delete(delete_nav_item))
}

async fn list_nav_items(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<NavItem>>>, ApiError> {
    Ok(ApiResponse::ok(state.nav_service.list().await?))
}

async fn list_nav_tree(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<NavItemTree>>>, ApiError> {
    Ok(ApiResponse::ok(state.nav_service.list_tree().await?))
}

async fn get_nav_item(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<NavItem>>, ApiError> {
    Ok(ApiResponse::ok(state.nav_service.get(id).await?))
}

async fn create_nav_item(
    State(state): State<AppState>,
    Json(input): Json<CreateNavItemInput>,
) -> Result<Response, ApiError> {
    Ok(ApiResponse::created(state.nav_service.create(input).await?))
}

async fn update_nav_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateNavItemInput>,
) -> Result<Json<ApiResponse<NavItem>>, ApiError> {
    Ok(ApiResponse::ok(state.nav_service.update(id, input).await?))
}

async fn update_nav_order(
    State(state): State<AppState>,
    Json(input): Json<UpdateNavOrderInput>,
) -> Result<Json<ApiResponse<Vec<NavItemTree>>>, ApiError> {
    state.nav_service.update_order(input.items).await?;
    Ok(ApiResponse::ok(state.nav_service.list_tree().await?))
}

async fn delete_nav_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.nav_service.delete(id).await?;
    Ok(MessageResponse::new("Nav item deleted"))
}
