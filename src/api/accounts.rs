//! Account management API (admin only)
//!
//! - GET/POST /api/v1/admin/accounts
//! - GET/PUT/DELETE /api/v1/admin/accounts/{id}

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::models::{Account, CreateAccountInput, UpdateAccountInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/{id}", get(get_account).put(update_account).delete(delete_account))
}

async fn list_accounts(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Account>>>, ApiError> {
    Ok(ApiResponse::ok(state.account_service.list().await?))
}

async fn create_account(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(input): Json<CreateAccountInput>,
) -> Result<Response, ApiError> {
    let account = state.account_service.create(input).await?;
    tracing::info!("Account {} created by {}", account.id, admin.id);
    Ok(ApiResponse::created(account))
}

async fn get_account(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<Account>>, ApiError> {
    Ok(ApiResponse::ok(state.account_service.get(id).await?))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateAccountInput>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    Ok(ApiResponse::ok(state.account_service.update(id, input).await?))
}

async fn delete_account(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.account_service.delete(id, admin.id).await?;
    Ok(MessageResponse::new("Account deleted"))
}
