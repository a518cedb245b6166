//! Newsletter API endpoints
//!
//! Public:
//! - POST /api/v1/newsletter/subscribe
//! - POST /api/v1/newsletter/unsubscribe
//!
//! Authenticated (`/api/v1/admin/newsletter`):
//! - GET /subscribers, DELETE /subscribers/{id}
//! - POST /subscribers/import (CSV body or multipart field `file`), GET /subscribers/export
//! - GET/POST /emails, GET/PUT/DELETE /emails/{id}, POST /emails/{id}/send
//! - GET/PUT /settings

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{
    CreateNewsletterEmailInput, ImportReport, NewsletterEmail, NewsletterSettings, SendReport, SubscribeInput,
    Subscriber, SubscriberStatus, UpdateNewsletterEmailInput,
};

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberQuery {
    #[serde(default)]
    pub status: Option<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/subscribers", get(list_subscribers))
        .route("/subscribers/import", post(import_subscribers))
        .route("/subscribers/export", get(export_subscribers))
        .route("/subscribers/{id}", delete(delete_subscriber))
        .route("/emails", get(list_emails).post(create_email))
        .route("/emails/{id}", get(get_email).put(update_email).delete(delete_email))
        .route("/emails/{id}/send", post(send_email))
        .route("/settings", get(get_settings).put(update_settings))
}

/// POST /api/v1/newsletter/subscribe
async fn subscribe(
    State(state): State<AppState>,
    Json(input): Json<SubscribeInput>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.newsletter_service.subscribe(input).await?;
    Ok(MessageResponse::new("Subscribed"))
}

/// POST /api/v1/newsletter/unsubscribe
async fn unsubscribe(
    State(state): State<AppState>,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.newsletter_service.unsubscribe(&body.token).await?;
    Ok(MessageResponse::new("Unsubscribed"))
}

async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<ApiResponse<Vec<Subscriber>>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty() && *s != "all") {
        Some(s) => Some(
            s.parse::<SubscriberStatus>()
                .map_err(|e| ApiError::validation_error(e.to_string()))?,
        ),
        None => None,
    };
    Ok(ApiResponse::ok(state.newsletter_service.list_subscribers(status).await?))
}

async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.newsletter_service.delete_subscriber(id).await?;
    Ok(MessageResponse::new("Subscriber deleted"))
}

/// POST /api/v1/admin/newsletter/subscribers/import
async fn import_subscribers(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ApiResponse<ImportReport>>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let data = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::validation_error(e.to_string()))?;
        let mut data = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
        {
            if field.name() == Some("file") {
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?,
                );
                break;
            }
        }
        data.ok_or_else(|| ApiError::validation_error("No file provided"))?
    } else {
        axum::body::Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::validation_error(e.to_string()))?
    };

    let report = state.newsletter_service.import_csv(&data).await?;
    tracing::info!("Subscriber import: {} imported, {} skipped", report.imported, report.skipped);
    Ok(ApiResponse::ok(report))
}

/// GET /api/v1/admin/newsletter/subscribers/export
async fn export_subscribers(State(state): State<AppState>) -> Result<Response, ApiError> {
    let csv = state.newsletter_service.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"subscribers.csv\""),
        ],
        csv,
    )
        .into_response())
}

async fn list_emails(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<NewsletterEmail>>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.list_emails().await?))
}

async fn create_email(
    State(state): State<AppState>,
    Json(input): Json<CreateNewsletterEmailInput>,
) -> Result<Response, ApiError> {
    Ok(ApiResponse::created(state.newsletter_service.create_email(input).await?))
}

async fn get_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<NewsletterEmail>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.get_email(id).await?))
}

async fn update_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateNewsletterEmailInput>,
) -> Result<Json<ApiResponse<NewsletterEmail>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.update_email(id, input).await?))
}

async fn delete_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.newsletter_service.delete_email(id).await?;
    Ok(MessageResponse::new("Email deleted"))
}

/// POST /api/v1/admin/newsletter/emails/{id}/send
async fn send_email(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<SendReport>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.send(id).await?))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<ApiResponse<NewsletterSettings>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.get_settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<NewsletterSettings>,
) -> Result<Json<ApiResponse<NewsletterSettings>>, ApiError> {
    Ok(ApiResponse::ok(state.newsletter_service.update_settings(settings).await?))
}
