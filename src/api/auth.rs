//! Authentication API endpoints
//!
//! - POST /api/v1/auth/request-code - Mail a one-time login code
//! - POST /api/v1/auth/verify-code - Trade the code for a session
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current account

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ClientIp, SessionToken};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::Account;

#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/request-code", post(request_code))
        .route("/verify-code", post(verify_code))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/v1/auth/request-code
///
/// Answers the same way whether or not the address belongs to an account.
async fn request_code(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<RequestCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth_service.request_code(&body.email, ip).await?;
    Ok(MessageResponse::new("If the address belongs to an account, a login code has been sent"))
}

/// POST /api/v1/auth/verify-code
async fn verify_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, account) = state.auth_service.verify_code(&body.email, &body.code).await?;

    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!("session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", session.id, max_age);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal_error(e.to_string()))?,
    );

    tracing::info!("Account {} signed in", account.id);
    Ok((
        headers,
        ApiResponse::ok(AuthResponse {
            token: session.id,
            expires_at: session.expires_at,
            account,
        }),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> Result<impl IntoResponse, ApiError> {
    state.auth_service.logout(&token).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((headers, MessageResponse::new("Logged out")))
}

/// GET /api/v1/auth/me
async fn me(AuthenticatedUser(account): AuthenticatedUser) -> Json<ApiResponse<Account>> {
    ApiResponse::ok(account)
}
