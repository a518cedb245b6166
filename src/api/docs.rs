//! Documentation API endpoints
//!
//! - GET /api/v1/docs - Published docs grouped by section
//! - GET /api/v1/docs/{slug} - A published doc with its neighbours
//! - GET/POST /api/v1/admin/docs, GET/PUT/DELETE /api/v1/admin/docs/{id}

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::AdminListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{CreateDocInput, Doc, DocSection, DocSummary, UpdateDocInput};

/// A doc with the previous and next entries in reading order
#[derive(Debug, Serialize)]
pub struct DocResponse {
    pub doc: Doc,
    pub prev: Option<DocSummary>,
    pub next: Option<DocSummary>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sections))
        .route("/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_docs).post(create_doc))
        .route("/{id}", get(get_doc).put(update_doc).delete(delete_doc))
}

async fn list_sections(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<DocSection>>>, ApiError> {
    Ok(ApiResponse::ok(state.doc_service.sections().await?))
}

async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<DocResponse>>, ApiError> {
    let doc = state.doc_service.get_published_by_slug(&slug).await?;
    let (prev, next) = state.doc_service.neighbors(&doc.slug).await?;
    Ok(ApiResponse::ok(DocResponse { doc, prev, next }))
}

async fn list_docs(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ApiResponse<Vec<Doc>>>, ApiError> {
    Ok(ApiResponse::ok(state.doc_service.list(query.status()?).await?))
}

async fn create_doc(State(state): State<AppState>, Json(input): Json<CreateDocInput>) -> Result<Response, ApiError> {
    Ok(ApiResponse::created(state.doc_service.create(input).await?))
}

async fn get_doc(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<Doc>>, ApiError> {
    Ok(ApiResponse::ok(state.doc_service.get(id).await?))
}

async fn update_doc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateDocInput>,
) -> Result<Json<ApiResponse<Doc>>, ApiError> {
    Ok(ApiResponse::ok(state.doc_service.update(id, input).await?))
}

async fn delete_doc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.doc_service.delete(id).await?;
    Ok(MessageResponse::new("Doc deleted"))
}
