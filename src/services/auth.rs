//! Passwordless authentication
//!
//! Accounts sign in by requesting a six-digit code by email and trading it
//! for a session token:
//! - Only known accounts receive a code; unknown addresses get the same reply
//! - Code requests are rate limited per email and per IP
//! - Codes are stored hashed, expire, and are discarded after too many wrong guesses

use crate::config::AuthConfig;
use crate::db::repositories::{AccountRepository, LoginCodeRepository, SessionRepository};
use crate::models::{Account, LoginCode, Session};
use crate::services::accounts::is_valid_email;
use crate::services::mailer::{Mailer, OutgoingMail};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::anyhow;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

/// Error types for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Counts of rows removed by [`AuthService::cleanup_expired`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions: u64,
    pub codes: u64,
}

pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    codes: Arc<dyn LoginCodeRepository>,
    mailer: Arc<dyn Mailer>,
    limiter: Arc<LoginRateLimiter>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
        codes: Arc<dyn LoginCodeRepository>,
        mailer: Arc<dyn Mailer>,
        limiter: Arc<LoginRateLimiter>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            codes,
            mailer,
            limiter,
            config,
        }
    }

    /// Send a login code to `email` if it belongs to an account.
    ///
    /// Succeeds silently for unknown addresses so the endpoint cannot be
    /// used to discover accounts.
    pub async fn request_code(&self, email: &str, ip: Option<IpAddr>) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::ValidationError("A valid email address is required".to_string()));
        }

        if let Some(ip) = ip {
            if !self.limiter.try_ip(ip).await {
                tracing::warn!("Login code requests from {} rate limited", ip);
                return Err(AuthError::RateLimited);
            }
        }
        if !self.limiter.try_email(&email).await {
            tracing::warn!("Login code requests for {} rate limited", email);
            return Err(AuthError::RateLimited);
        }

        if self.accounts.get_by_email(&email).await?.is_none() {
            tracing::debug!("Login code requested for unknown address {}", email);
            return Ok(());
        }

        let code = generate_code()?;
        let now = Utc::now();
        self.codes
            .upsert(&LoginCode {
                email: email.clone(),
                code_hash: hash_code(&email, &code),
                attempts: 0,
                expires_at: now + Duration::minutes(self.config.code_minutes),
                created_at: now,
            })
            .await?;

        let mail = OutgoingMail {
            to: email.clone(),
            subject: "Your login code".to_string(),
            text: format!(
                "Your login code: {}\n\nIt expires in {} minutes. If you did not request it, you can ignore this email.\n",
                code, self.config.code_minutes
            ),
            ..Default::default()
        };
        self.mailer.send(&mail).await?;

        tracing::info!("Login code sent to {}", email);
        Ok(())
    }

    /// Exchange a login code for a session
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(Session, Account), AuthError> {
        let email = normalize_email(email);
        let code = code.trim();
        if email.is_empty() || code.is_empty() {
            return Err(AuthError::ValidationError("Email and code are required".to_string()));
        }

        let stored = self.codes.get(&email).await?.ok_or(AuthError::InvalidCode)?;

        if stored.is_expired() {
            self.codes.delete(&email).await?;
            return Err(AuthError::InvalidCode);
        }
        if stored.attempts >= self.config.max_code_attempts {
            self.codes.delete(&email).await?;
            return Err(AuthError::TooManyAttempts);
        }

        if !constant_time_eq(stored.code_hash.as_bytes(), hash_code(&email, code).as_bytes()) {
            let attempts = self.codes.increment_attempts(&email).await?;
            if attempts >= self.config.max_code_attempts {
                self.codes.delete(&email).await?;
                tracing::warn!("Login code for {} discarded after {} failed attempts", email, attempts);
                return Err(AuthError::TooManyAttempts);
            }
            return Err(AuthError::InvalidCode);
        }

        self.codes.delete(&email).await?;
        self.limiter.clear_email(&email).await;

        let account = self.accounts.get_by_email(&email).await?.ok_or(AuthError::InvalidCode)?;
        let session = self.create_session(account.id).await?;

        tracing::info!("Account {} signed in", account.email);
        Ok((session, account))
    }

    /// Resolve a session token to its account; expired sessions are removed
    pub async fn validate_session(&self, token: &str) -> Result<Option<Account>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        let session = match self.sessions.get_by_id(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };
        if session.is_expired() {
            self.sessions.delete(token).await?;
            return Ok(None);
        }
        Ok(self.accounts.get_by_id(session.account_id).await?)
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete(token).await?;
        Ok(())
    }

    /// Remove expired sessions and codes and prune the rate limiter
    pub async fn cleanup_expired(&self) -> Result<CleanupReport, AuthError> {
        let report = CleanupReport {
            sessions: self.sessions.delete_expired().await?,
            codes: self.codes.delete_expired().await?,
        };
        self.limiter.cleanup().await;
        Ok(report)
    }

    async fn create_session(&self, account_id: i64) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            account_id,
            expires_at: now + Duration::days(self.config.session_days),
            created_at: now,
        };
        Ok(self.sessions.create(&session).await?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Six random decimal digits
fn generate_code() -> anyhow::Result<String> {
    // Largest multiple of 1_000_000 below 2^32; rejecting above it keeps digits uniform
    const LIMIT: u32 = 4_294_000_000;
    loop {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf).map_err(|e| anyhow!("Failed to generate login code: {}", e))?;
        let value = u32::from_le_bytes(buf);
        if value < LIMIT {
            return Ok(format!("{:06}", value % 1_000_000));
        }
    }
}

fn hash_code(email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
