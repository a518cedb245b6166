//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope and its status mapping
//! - Session authentication (Bearer token or `session` cookie)
//! - Admin authorization

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::*;
use crate::db::DynDatabasePool;
use crate::models::Account;
use crate::services::{
    AccountService, AuthService, DocService, LoginRateLimiter, Mailer, MarkdownRenderer, MediaService,
    NavItemService, NewsletterService, PageService, PostService, SettingsService,
};
use crate::theme::ThemeEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub account_service: Arc<AccountService>,
    pub post_service: Arc<PostService>,
    pub page_service: Arc<PageService>,
    pub doc_service: Arc<DocService>,
    pub nav_service: Arc<NavItemService>,
    pub settings_service: Arc<SettingsService>,
    pub newsletter_service: Arc<NewsletterService>,
    pub media_service: Arc<MediaService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub theme_engine: Arc<ThemeEngine>,
}

impl AppState {
    /// Wire repositories, cache and services over an already migrated pool
    pub fn new(config: Config, pool: DynDatabasePool, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let markdown = Arc::new(MarkdownRenderer::new());
        let rate_limiter = Arc::new(LoginRateLimiter::new());
        let theme_engine = Arc::new(ThemeEngine::new(config.server.templates_path.as_deref())?);

        let accounts = SqlxAccountRepository::boxed(pool.clone());
        let settings_repo = SqlxSettingsRepository::boxed(pool.clone());

        let auth_service = AuthService::new(
            accounts.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxLoginCodeRepository::boxed(pool.clone()),
            mailer.clone(),
            rate_limiter.clone(),
            config.auth.clone(),
        );
        let newsletter_service = NewsletterService::new(
            SqlxSubscriberRepository::boxed(pool.clone()),
            SqlxNewsletterEmailRepository::boxed(pool.clone()),
            settings_repo.clone(),
            mailer,
            markdown.clone(),
            config.server.public_url.clone(),
        );

        Ok(Self {
            auth_service: Arc::new(auth_service),
            account_service: Arc::new(AccountService::new(accounts)),
            post_service: Arc::new(PostService::new(
                SqlxPostRepository::boxed(pool.clone()),
                cache.clone(),
                markdown.clone(),
            )),
            page_service: Arc::new(PageService::new(
                SqlxPageRepository::boxed(pool.clone()),
                cache.clone(),
                markdown.clone(),
            )),
            doc_service: Arc::new(DocService::new(SqlxDocRepository::boxed(pool.clone()), cache.clone(), markdown)),
            nav_service: Arc::new(NavItemService::new(SqlxNavItemRepository::boxed(pool.clone()), cache.clone())),
            settings_service: Arc::new(SettingsService::new(settings_repo, cache)),
            newsletter_service: Arc::new(newsletter_service),
            media_service: Arc::new(MediaService::new(config.upload.clone())),
            rate_limiter,
            theme_engine,
            config: Arc::new(config),
            pool,
        })
    }
}

/// Authenticated account extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Account);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Session token presented with the request
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_session_token(&parts.headers)
            .map(SessionToken)
            .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))
    }
}

/// Address of the client, when it can be determined
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        let connected = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(forwarded.or(connected)))
    }
}

/// Error response for API errors:
/// `{ "success": false, "error": message, "code": CODE }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "NOT_INSTALLED" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} {}", self.code, self.error);
        }
        (status, Json(self)).into_response()
    }
}

/// Extract session token from the `Authorization` header or `session` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .filter_map(|c| c.trim().strip_prefix("session="))
                .find(|t| !t.is_empty())
                .map(str::to_string)
        })
}

/// Authentication middleware
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let account = state
        .auth_service
        .validate_session(&token)
        .await
        .map_err(|e| ApiError::internal_error(format!("Session validation failed: {}", e)))?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(account));
    Ok(next.run(request).await)
}

/// Admin authorization middleware, layered inside [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&h), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let h = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&h), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&h), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let basic = headers(&[(header::AUTHORIZATION, "Basic abc")]);
        assert!(extract_session_token(&basic).is_none());
        let empty_cookie = headers(&[(header::COOKIE, "session=")]);
        assert!(extract_session_token(&empty_cookie).is_none());
    }

    #[test]
    fn test_api_error_status_mapping() {
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::rate_limited("x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::new("SOMETHING", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_envelope() {
        let json = serde_json::to_value(ApiError::conflict("Slug already in use")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Slug already in use");
        assert_eq!(json["code"], "CONFLICT");
        assert!(json.get("details").is_none());

        let with = ApiError::with_details("INTERNAL_ERROR", "failed", serde_json::json!({"file": "0002"}));
        assert_eq!(serde_json::to_value(with).unwrap()["details"]["file"], "0002");
    }
}
