//! Session and login code models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for account authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    /// Associated account ID
    pub account_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// A pending one-time login code
///
/// Only the SHA-256 hash of the code is kept. There is at most one pending
/// code per email; requesting a new one replaces it.
#[derive(Debug, Clone)]
pub struct LoginCode {
    pub email: String,
    pub code_hash: String,
    /// Failed verification attempts so far
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LoginCode {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
