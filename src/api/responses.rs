//! Shared API response types
//!
//! Successful JSON responses are wrapped as `{ "success": true, "data": T }`.
//! Service errors are converted to [`ApiError`] here so handlers can use `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::services::{
    AccountServiceError, AuthError, ContentError, InstallError, MediaError, NavItemError, NewsletterError,
    SettingsServiceError,
};

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }

    /// `201 Created` with the envelope
    pub fn created(data: T) -> Response {
        (StatusCode::CREATED, Json(Self { success: true, data })).into_response()
    }
}

/// Body for operations that have nothing to return
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<ApiResponse<MessageResponse>> {
        ApiResponse::ok(Self { message: message.into() })
    }
}

// ============================================================================
// Service error conversions
// ============================================================================

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound(_) => ApiError::not_found(e.to_string()),
            ContentError::ValidationError(msg) => ApiError::validation_error(msg),
            ContentError::SlugConflict(_) => ApiError::conflict(e.to_string()),
            ContentError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => ApiError::validation_error(msg),
            AuthError::RateLimited | AuthError::TooManyAttempts => ApiError::rate_limited(e.to_string()),
            AuthError::InvalidCode => ApiError::unauthorized(e.to_string()),
            AuthError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(e: AccountServiceError) -> Self {
        match e {
            AccountServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AccountServiceError::NotFound => ApiError::not_found(e.to_string()),
            AccountServiceError::EmailTaken(_) => ApiError::conflict(e.to_string()),
            AccountServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            AccountServiceError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<NavItemError> for ApiError {
    fn from(e: NavItemError) -> Self {
        match e {
            NavItemError::NotFound(_) => ApiError::not_found(e.to_string()),
            NavItemError::ValidationError(msg) => ApiError::validation_error(msg),
            NavItemError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<NewsletterError> for ApiError {
    fn from(e: NewsletterError) -> Self {
        match e {
            NewsletterError::ValidationError(msg) => ApiError::validation_error(msg),
            NewsletterError::NotFound(_) => ApiError::not_found(e.to_string()),
            NewsletterError::Conflict(msg) => ApiError::conflict(msg),
            NewsletterError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(e: SettingsServiceError) -> Self {
        match e {
            SettingsServiceError::InvalidValue(msg) => ApiError::validation_error(msg),
            other => ApiError::internal_error(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::ValidationError(msg) => ApiError::validation_error(msg),
            MediaError::NotFound(_) => ApiError::not_found(e.to_string()),
            MediaError::InternalError(err) => ApiError::internal_error(format!("{:#}", err)),
        }
    }
}

impl From<InstallError> for ApiError {
    fn from(e: InstallError) -> Self {
        match e {
            InstallError::OutOfOrder { .. } | InstallError::AccountsExist => ApiError::conflict(e.to_string()),
            InstallError::ValidationError(msg) => ApiError::validation_error(msg),
            InstallError::Database(_) => ApiError::validation_error(e.to_string()),
            InstallError::Migration(err) => {
                let details = serde_json::to_value(&err).unwrap_or_default();
                ApiError::with_details("MIGRATION_FAILED", err.to_string(), details)
            }
            InstallError::Config(_) | InstallError::InternalError(_) => ApiError::internal_error(e.to_string()),
        }
    }
}
