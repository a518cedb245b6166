//! Blog post API endpoints
//!
//! Public:
//! - GET /api/v1/posts - Published posts, paginated
//! - GET /api/v1/posts/{slug} - A published post
//!
//! Authenticated:
//! - GET/POST /api/v1/admin/posts
//! - GET/PUT/DELETE /api/v1/admin/posts/{id}

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};

use crate::api::common::{AdminListQuery, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{CreatePostInput, PagedResult, Post, UpdatePostInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
}

async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<PagedResult<Post>>>, ApiError> {
    let per_page = state.settings_service.get_site_settings().await?.posts_per_page;
    let posts = state.post_service.list_published(&query.params(per_page)).await?;
    Ok(ApiResponse::ok(posts))
}

async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    Ok(ApiResponse::ok(state.post_service.get_published_by_slug(&slug).await?))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<PagedResult<Post>>>, ApiError> {
    let posts = state.post_service.list(&query.params(), query.status()?).await?;
    Ok(ApiResponse::ok(posts))
}

async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(account): AuthenticatedUser,
    Json(input): Json<CreatePostInput>,
) -> Result<Response, ApiError> {
    let post = state.post_service.create(input, Some(account.id)).await?;
    Ok(ApiResponse::created(post))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<Post>>, ApiError> {
    Ok(ApiResponse::ok(state.post_service.get(id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    Ok(ApiResponse::ok(state.post_service.update(id, input).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.post_service.delete(id).await?;
    Ok(MessageResponse::new("Post deleted"))
}
