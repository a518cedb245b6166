//! Login code repository
//!
//! Stores the hashed one-time codes used for email sign-in. There is at
//! most one pending code per email address.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::LoginCode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LoginCodeRepository: Send + Sync {
    /// Store a code, replacing any pending code for the same email
    async fn upsert(&self, code: &LoginCode) -> Result<()>;
    async fn get(&self, email: &str) -> Result<Option<LoginCode>>;
    /// Increment the failed attempt counter, returning the new value
    async fn increment_attempts(&self, email: &str) -> Result<i32>;
    async fn delete(&self, email: &str) -> Result<()>;
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxLoginCodeRepository {
    pool: DynDatabasePool,
}

impl SqlxLoginCodeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LoginCodeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LoginCodeRepository for SqlxLoginCodeRepository {
    async fn upsert(&self, code: &LoginCode) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "INSERT INTO login_codes (email, code_hash, attempts, expires_at, created_at) VALUES (?, ?, 0, ?, ?)
                     ON CONFLICT(email) DO UPDATE SET code_hash = excluded.code_hash, attempts = 0,
                     expires_at = excluded.expires_at, created_at = excluded.created_at",
                )
                .bind(&code.email)
                .bind(&code.code_hash)
                .bind(code.expires_at)
                .bind(code.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to store login code")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "INSERT INTO login_codes (email, code_hash, attempts, expires_at, created_at) VALUES ($1, $2, 0, $3, $4)
                     ON CONFLICT (email) DO UPDATE SET code_hash = EXCLUDED.code_hash, attempts = 0,
                     expires_at = EXCLUDED.expires_at, created_at = EXCLUDED.created_at",
                )
                .bind(&code.email)
                .bind(&code.code_hash)
                .bind(code.expires_at)
                .bind(code.created_at)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to store login code")?;
            }
        }
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<LoginCode>> {
        let sql = "SELECT email, code_hash, attempts, expires_at, created_at FROM login_codes WHERE email = ";
        let code = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&format!("{}?", sql))
                .bind(email)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get login code")?
                .map(|r| LoginCode {
                    email: r.get("email"),
                    code_hash: r.get("code_hash"),
                    attempts: r.get("attempts"),
                    expires_at: r.get("expires_at"),
                    created_at: r.get("created_at"),
                }),
            DatabaseDriver::Postgres => sqlx::query(&format!("{}$1", sql))
                .bind(email)
                .fetch_optional(self.pool.postgres()?)
                .await
                .context("Failed to get login code")?
                .map(|r| LoginCode {
                    email: r.get("email"),
                    code_hash: r.get("code_hash"),
                    attempts: r.get("attempts"),
                    expires_at: r.get("expires_at"),
                    created_at: r.get("created_at"),
                }),
        };
        Ok(code)
    }

    async fn increment_attempts(&self, email: &str) -> Result<i32> {
        let attempts = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                sqlx::query("UPDATE login_codes SET attempts = attempts + 1 WHERE email = ?")
                    .bind(email)
                    .execute(pool)
                    .await
                    .context("Failed to count login attempt")?;
                sqlx::query("SELECT attempts FROM login_codes WHERE email = ?")
                    .bind(email)
                    .fetch_optional(pool)
                    .await?
                    .map(|r| r.get::<i32, _>("attempts"))
            }
            DatabaseDriver::Postgres => sqlx::query(
                "UPDATE login_codes SET attempts = attempts + 1 WHERE email = $1 RETURNING attempts",
            )
            .bind(email)
            .fetch_optional(self.pool.postgres()?)
            .await
            .context("Failed to count login attempt")?
            .map(|r| r.get::<i32, _>("attempts")),
        };
        Ok(attempts.unwrap_or(0))
    }

    async fn delete(&self, email: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM login_codes WHERE email = ?")
                    .bind(email)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete login code")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM login_codes WHERE email = $1")
                    .bind(email)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete login code")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let deleted = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM login_codes WHERE expires_at < ?")
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete expired login codes")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM login_codes WHERE expires_at < $1")
                .bind(now)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete expired login codes")?
                .rows_affected(),
        };
        Ok(deleted)
    }
}
