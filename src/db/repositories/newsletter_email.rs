//! Newsletter email repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::NewsletterEmail;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait NewsletterEmailRepository: Send + Sync {
    async fn create(&self, email: &NewsletterEmail) -> Result<NewsletterEmail>;
    async fn get_by_id(&self, id: i64) -> Result<Option<NewsletterEmail>>;
    /// List emails newest first
    async fn list(&self) -> Result<Vec<NewsletterEmail>>;
    /// Persist subject and content of a draft
    async fn update(&self, email: &NewsletterEmail) -> Result<NewsletterEmail>;
    async fn mark_sent(&self, id: i64, recipient_count: i32, sent_at: DateTime<Utc>) -> Result<NewsletterEmail>;
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxNewsletterEmailRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterEmailRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterEmailRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, subject, content, content_html, status, recipient_count, sent_at, created_at, updated_at";

#[async_trait]
impl NewsletterEmailRepository for SqlxNewsletterEmailRepository {
    async fn create(&self, email: &NewsletterEmail) -> Result<NewsletterEmail> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT INTO newsletter_emails (subject, content, content_html, status, recipient_count, created_at, \
                 updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&email.subject)
            .bind(&email.content)
            .bind(&email.content_html)
            .bind(email.status.to_string())
            .bind(email.recipient_count)
            .bind(now)
            .bind(now)
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to create newsletter email")?
            .last_insert_rowid(),
            DatabaseDriver::Postgres => sqlx::query(
                "INSERT INTO newsletter_emails (subject, content, content_html, status, recipient_count, created_at, \
                 updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(&email.subject)
            .bind(&email.content)
            .bind(&email.content_html)
            .bind(email.status.to_string())
            .bind(email.recipient_count)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool.postgres()?)
            .await
            .context("Failed to create newsletter email")?
            .get("id"),
        };
        Ok(NewsletterEmail {
            id,
            created_at: now,
            updated_at: now,
            ..email.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<NewsletterEmail>> {
        let email = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM newsletter_emails WHERE id = ?", COLUMNS);
                sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get newsletter email")?
                    .map(|r| row_to_email_sqlite(&r))
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM newsletter_emails WHERE id = $1", COLUMNS);
                sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get newsletter email")?
                    .map(|r| row_to_email_postgres(&r))
            }
        };
        Ok(email)
    }

    async fn list(&self) -> Result<Vec<NewsletterEmail>> {
        let sql = format!("SELECT {} FROM newsletter_emails ORDER BY created_at DESC, id DESC", COLUMNS);
        let emails: Vec<NewsletterEmail> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list newsletter emails")?
                .iter()
                .map(row_to_email_sqlite)
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(&sql)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to list newsletter emails")?
                .iter()
                .map(row_to_email_postgres)
                .collect(),
        };
        Ok(emails)
    }

    async fn update(&self, email: &NewsletterEmail) -> Result<NewsletterEmail> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "UPDATE newsletter_emails SET subject = ?, content = ?, content_html = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&email.subject)
                .bind(&email.content)
                .bind(&email.content_html)
                .bind(Utc::now())
                .bind(email.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update newsletter email")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "UPDATE newsletter_emails SET subject = $1, content = $2, content_html = $3, updated_at = $4 \
                     WHERE id = $5",
                )
                .bind(&email.subject)
                .bind(&email.content)
                .bind(&email.content_html)
                .bind(Utc::now())
                .bind(email.id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to update newsletter email")?;
            }
        }
        self.get_by_id(email.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Newsletter email not found after update"))
    }

    async fn mark_sent(&self, id: i64, recipient_count: i32, sent_at: DateTime<Utc>) -> Result<NewsletterEmail> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "UPDATE newsletter_emails SET status = 'sent', recipient_count = ?, sent_at = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(recipient_count)
                .bind(sent_at)
                .bind(sent_at)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark newsletter email sent")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "UPDATE newsletter_emails SET status = 'sent', recipient_count = $1, sent_at = $2, updated_at = $3 \
                     WHERE id = $4",
                )
                .bind(recipient_count)
                .bind(sent_at)
                .bind(sent_at)
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to mark newsletter email sent")?;
            }
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Newsletter email not found after send"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM newsletter_emails WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete newsletter email")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM newsletter_emails WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete newsletter email")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn row_to_email_sqlite(row: &sqlx::sqlite::SqliteRow) -> NewsletterEmail {
    let status: String = row.get("status");
    NewsletterEmail {
        id: row.get("id"),
        subject: row.get("subject"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        status: status.parse().unwrap_or_default(),
        recipient_count: row.get("recipient_count"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_email_postgres(row: &sqlx::postgres::PgRow) -> NewsletterEmail {
    let status: String = row.get("status");
    NewsletterEmail {
        id: row.get("id"),
        subject: row.get("subject"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        status: status.parse().unwrap_or_default(),
        recipient_count: row.get("recipient_count"),
        sent_at: row.get("sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::NewsletterEmailStatus;

    async fn setup_test_repo() -> SqlxNewsletterEmailRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxNewsletterEmailRepository::new(pool)
    }

    fn draft(subject: &str) -> NewsletterEmail {
        let now = Utc::now();
        NewsletterEmail {
            id: 0,
            subject: subject.into(),
            content: "Hello".into(),
            content_html: "<p>Hello</p>".into(),
            status: NewsletterEmailStatus::Draft,
            recipient_count: 0,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_update_and_mark_sent() {
        let repo = setup_test_repo().await;
        let mut email = repo.create(&draft("Issue 1")).await.unwrap();
        assert!(email.id > 0);

        email.subject = "Issue #1".into();
        let updated = repo.update(&email).await.unwrap();
        assert_eq!(updated.subject, "Issue #1");
        assert_eq!(updated.status, NewsletterEmailStatus::Draft);

        let sent = repo.mark_sent(email.id, 42, Utc::now()).await.unwrap();
        assert_eq!(sent.status, NewsletterEmailStatus::Sent);
        assert_eq!(sent.recipient_count, 42);
        assert!(sent.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = setup_test_repo().await;
        let first = repo.create(&draft("First")).await.unwrap();
        repo.create(&draft("Second")).await.unwrap();

        let emails = repo.list().await.unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].subject, "Second");

        assert!(repo.delete(first.id).await.unwrap());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
