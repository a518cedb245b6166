//! Newsletter subscriber repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Subscriber, SubscriberStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn create(&self, subscriber: &Subscriber) -> Result<Subscriber>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Subscriber>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>>;
    async fn get_by_token(&self, token: &str) -> Result<Option<Subscriber>>;
    /// List subscribers oldest first, optionally filtered by status
    async fn list(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>>;
    /// Persist name, status and `unsubscribed_at`
    async fn update(&self, subscriber: &Subscriber) -> Result<Subscriber>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn count(&self, status: Option<SubscriberStatus>) -> Result<i64>;
}

pub struct SqlxSubscriberRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriberRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, email, name, status, token, created_at, unsubscribed_at";

#[async_trait]
impl SubscriberRepository for SqlxSubscriberRepository {
    async fn create(&self, subscriber: &Subscriber) -> Result<Subscriber> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT INTO subscribers (email, name, status, token, created_at, unsubscribed_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&subscriber.email)
            .bind(&subscriber.name)
            .bind(subscriber.status.to_string())
            .bind(&subscriber.token)
            .bind(subscriber.created_at)
            .bind(subscriber.unsubscribed_at)
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to create subscriber")?
            .last_insert_rowid(),
            DatabaseDriver::Postgres => sqlx::query(
                "INSERT INTO subscribers (email, name, status, token, created_at, unsubscribed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(&subscriber.email)
            .bind(&subscriber.name)
            .bind(subscriber.status.to_string())
            .bind(&subscriber.token)
            .bind(subscriber.created_at)
            .bind(subscriber.unsubscribed_at)
            .fetch_one(self.pool.postgres()?)
            .await
            .context("Failed to create subscriber")?
            .get("id"),
        };
        Ok(Subscriber { id, ..subscriber.clone() })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscriber>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_sqlite(self.pool.sqlite()?, "id", id).await,
            DatabaseDriver::Postgres => get_by_postgres(self.pool.postgres()?, "id", id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let email = email.trim().to_lowercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_sqlite(self.pool.sqlite()?, "email", email).await,
            DatabaseDriver::Postgres => get_by_postgres(self.pool.postgres()?, "email", email).await,
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Subscriber>> {
        let token = token.to_string();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_sqlite(self.pool.sqlite()?, "token", token).await,
            DatabaseDriver::Postgres => get_by_postgres(self.pool.postgres()?, "token", token).await,
        }
    }

    async fn list(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>> {
        let status = status.map(|s| s.to_string());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM subscribers WHERE status = ? ORDER BY id", COLUMNS),
                    None => format!("SELECT {} FROM subscribers ORDER BY id", COLUMNS),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list subscribers")?;
                Ok(rows.iter().map(row_to_subscriber_sqlite).collect())
            }
            DatabaseDriver::Postgres => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM subscribers WHERE status = $1 ORDER BY id", COLUMNS),
                    None => format!("SELECT {} FROM subscribers ORDER BY id", COLUMNS),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to list subscribers")?;
                Ok(rows.iter().map(row_to_subscriber_postgres).collect())
            }
        }
    }

    async fn update(&self, subscriber: &Subscriber) -> Result<Subscriber> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("UPDATE subscribers SET name = ?, status = ?, unsubscribed_at = ? WHERE id = ?")
                    .bind(&subscriber.name)
                    .bind(subscriber.status.to_string())
                    .bind(subscriber.unsubscribed_at)
                    .bind(subscriber.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update subscriber")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("UPDATE subscribers SET name = $1, status = $2, unsubscribed_at = $3 WHERE id = $4")
                    .bind(&subscriber.name)
                    .bind(subscriber.status.to_string())
                    .bind(subscriber.unsubscribed_at)
                    .bind(subscriber.id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update subscriber")?;
            }
        }
        self.get_by_id(subscriber.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Subscriber not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM subscribers WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete subscriber")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM subscribers WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete subscriber")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self, status: Option<SubscriberStatus>) -> Result<i64> {
        let status = status.map(|s| s.to_string());
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = match status {
                    Some(_) => "SELECT COUNT(*) as count FROM subscribers WHERE status = ?",
                    None => "SELECT COUNT(*) as count FROM subscribers",
                };
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                query.fetch_one(self.pool.sqlite()?).await?.get("count")
            }
            DatabaseDriver::Postgres => {
                let sql = match status {
                    Some(_) => "SELECT COUNT(*) as count FROM subscribers WHERE status = $1",
                    None => "SELECT COUNT(*) as count FROM subscribers",
                };
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                query.fetch_one(self.pool.postgres()?).await?.get("count")
            }
        };
        Ok(count)
    }
}

async fn get_by_sqlite<T>(pool: &SqlitePool, column: &str, value: T) -> Result<Option<Subscriber>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> + Send + 'static,
{
    let sql = format!("SELECT {} FROM subscribers WHERE {} = ?", COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get subscriber")?;
    Ok(row.map(|r| row_to_subscriber_sqlite(&r)))
}

fn row_to_subscriber_sqlite(row: &sqlx::sqlite::SqliteRow) -> Subscriber {
    let status: String = row.get("status");
    Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        status: status.parse().unwrap_or_default(),
        token: row.get("token"),
        created_at: row.get("created_at"),
        unsubscribed_at: row.get("unsubscribed_at"),
    }
}

async fn get_by_postgres<T>(pool: &PgPool, column: &str, value: T) -> Result<Option<Subscriber>>
where
    T: for<'q> sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'static,
{
    let sql = format!("SELECT {} FROM subscribers WHERE {} = $1", COLUMNS, column);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("Failed to get subscriber")?;
    Ok(row.map(|r| row_to_subscriber_postgres(&r)))
}

fn row_to_subscriber_postgres(row: &sqlx::postgres::PgRow) -> Subscriber {
    let status: String = row.get("status");
    Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        status: status.parse().unwrap_or_default(),
        token: row.get("token"),
        created_at: row.get("created_at"),
        unsubscribed_at: row.get("unsubscribed_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;
    use uuid::Uuid;

    async fn setup_test_repo() -> SqlxSubscriberRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxSubscriberRepository::new(pool)
    }

    fn subscriber(email: &str) -> Subscriber {
        Subscriber {
            id: 0,
            email: email.into(),
            name: String::new(),
            status: SubscriberStatus::Subscribed,
            token: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
            unsubscribed_at: None,
        }
    }

    #[tokio::test]
    async fn test_lookups() {
        let repo = setup_test_repo().await;
        let created = repo.create(&subscriber("reader@example.com")).await.unwrap();

        let by_email = repo.get_by_email("Reader@Example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_token = repo.get_by_token(&created.token).await.unwrap().unwrap();
        assert_eq!(by_token.id, created.id);
        assert!(repo.get_by_token("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_filters_and_counts() {
        let repo = setup_test_repo().await;
        repo.create(&subscriber("a@example.com")).await.unwrap();
        let mut b = repo.create(&subscriber("b@example.com")).await.unwrap();

        b.status = SubscriberStatus::Unsubscribed;
        b.unsubscribed_at = Some(Utc::now());
        let updated = repo.update(&b).await.unwrap();
        assert!(updated.unsubscribed_at.is_some());

        assert_eq!(repo.count(None).await.unwrap(), 2);
        assert_eq!(repo.count(Some(SubscriberStatus::Subscribed)).await.unwrap(), 1);
        let unsubscribed = repo.list(Some(SubscriberStatus::Unsubscribed)).await.unwrap();
        assert_eq!(unsubscribed.len(), 1);
        assert_eq!(unsubscribed[0].email, "b@example.com");

        assert!(repo.delete(b.id).await.unwrap());
        assert_eq!(repo.count(None).await.unwrap(), 1);
    }
}
