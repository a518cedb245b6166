//! Settings repository
//!
//! Key/value storage for site and newsletter settings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;

/// A setting key-value pair
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Get a single setting by key
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    /// Get all settings
    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Get multiple settings by keys; missing keys are absent from the map
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Insert or replace a single setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Set multiple settings at once
    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sqlite(self.pool.sqlite()?, key).await,
            DatabaseDriver::Postgres => get_postgres(self.pool.postgres()?, key).await,
        }
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        let sql = "SELECT key, value, updated_at FROM settings ORDER BY key";
        let settings: Vec<Setting> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list settings")?
                .into_iter()
                .map(|r| Setting {
                    key: r.get("key"),
                    value: r.get("value"),
                    updated_at: r.get("updated_at"),
                })
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(sql)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to list settings")?
                .into_iter()
                .map(|r| Setting {
                    key: r.get("key"),
                    value: r.get("value"),
                    updated_at: r.get("updated_at"),
                })
                .collect(),
        };
        Ok(settings)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        for key in keys {
            if let Some(setting) = self.get(key).await? {
                result.insert(setting.key, setting.value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_sqlite(self.pool.sqlite()?, key, value).await,
            DatabaseDriver::Postgres => set_postgres(self.pool.postgres()?, key, value).await,
        }
    }

    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM settings WHERE key = ?")
                    .bind(key)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete setting")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM settings WHERE key = $1")
                    .bind(key)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete setting")?;
            }
        }
        Ok(())
    }
}

async fn get_sqlite(pool: &SqlitePool, key: &str) -> Result<Option<Setting>> {
    let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("key"),
        value: r.get("value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn set_sqlite(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to set setting {}", key))?;
    Ok(())
}

async fn get_postgres(pool: &PgPool, key: &str) -> Result<Option<Setting>> {
    let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get setting")?;

    Ok(row.map(|r| Setting {
        key: r.get("key"),
        value: r.get("value"),
        updated_at: r.get("updated_at"),
    }))
}

async fn set_postgres(pool: &PgPool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("Failed to set setting {}", key))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxSettingsRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_seeded_defaults_readable() {
        let repo = setup_test_repo().await;
        let setting = repo.get("posts_per_page").await.unwrap().unwrap();
        assert_eq!(setting.value, "10");
        assert!(repo.get_all().await.unwrap().len() >= 9);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let repo = setup_test_repo().await;
        repo.set("site_name", "My Site").await.unwrap();
        repo.set("custom_key", "one").await.unwrap();
        repo.set("custom_key", "two").await.unwrap();

        let many = repo.get_many(&["site_name", "custom_key", "missing"]).await.unwrap();
        assert_eq!(many.get("site_name").map(String::as_str), Some("My Site"));
        assert_eq!(many.get("custom_key").map(String::as_str), Some("two"));
        assert!(!many.contains_key("missing"));
    }

    #[tokio::test]
    async fn test_set_many_and_delete() {
        let repo = setup_test_repo().await;
        let mut values = HashMap::new();
        values.insert("a".to_string(), "1".to_string());
        values.insert("b".to_string(), "2".to_string());
        repo.set_many(&values).await.unwrap();

        repo.delete("a").await.unwrap();
        assert!(repo.get("a").await.unwrap().is_none());
        assert_eq!(repo.get("b").await.unwrap().unwrap().value, "2");
    }
}
