//! Page repository
//!
//! Block lists are stored as JSON text in the `blocks` column.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Block, ContentStatus, Page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>>;
    async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Page>>;
    async fn update(&self, page: &Page) -> Result<Page>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, page).await,
            DatabaseDriver::Postgres => create_postgres(self.pool.postgres()?, page).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM pages WHERE id = ?", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get page")?;
                row.map(|r| row_to_page_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM pages WHERE id = $1", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get page")?;
                row.map(|r| row_to_page_postgres(&r)).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM pages WHERE slug = ?", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get page by slug")?;
                row.map(|r| row_to_page_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM pages WHERE slug = $1", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get page by slug")?;
                row.map(|r| row_to_page_postgres(&r)).transpose()
            }
        }
    }

    async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Page>> {
        let status = status.map(|s| s.to_string());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM pages WHERE status = ? ORDER BY title", COLUMNS),
                    None => format!("SELECT {} FROM pages ORDER BY title", COLUMNS),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list pages")?;
                rows.iter().map(row_to_page_sqlite).collect()
            }
            DatabaseDriver::Postgres => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM pages WHERE status = $1 ORDER BY title", COLUMNS),
                    None => format!("SELECT {} FROM pages ORDER BY title", COLUMNS),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to list pages")?;
                rows.iter().map(row_to_page_postgres).collect()
            }
        }
    }

    async fn update(&self, page: &Page) -> Result<Page> {
        let blocks = serde_json::to_string(&page.blocks)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "UPDATE pages SET slug = ?, title = ?, blocks = ?, content_html = ?, status = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(&page.slug)
                .bind(&page.title)
                .bind(&blocks)
                .bind(&page.content_html)
                .bind(page.status.to_string())
                .bind(Utc::now())
                .bind(page.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update page")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "UPDATE pages SET slug = $1, title = $2, blocks = $3, content_html = $4, status = $5, \
                     updated_at = $6 WHERE id = $7",
                )
                .bind(&page.slug)
                .bind(&page.title)
                .bind(&blocks)
                .bind(&page.content_html)
                .bind(page.status.to_string())
                .bind(Utc::now())
                .bind(page.id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to update page")?;
            }
        }
        self.get_by_id(page.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM pages WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM pages WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM pages WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM pages WHERE slug = $1 AND id != $2")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.postgres()?)
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }
}

const COLUMNS: &str = "id, slug, title, blocks, content_html, status, created_at, updated_at";

fn parse_blocks(raw: &str) -> Result<Vec<Block>> {
    serde_json::from_str(raw).context("Stored page blocks are not valid JSON")
}

async fn create_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO pages (slug, title, blocks, content_html, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&page.slug)
    .bind(&page.title)
    .bind(serde_json::to_string(&page.blocks)?)
    .bind(&page.content_html)
    .bind(page.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..page.clone()
    })
}

fn row_to_page_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Page> {
    let status: String = row.get("status");
    let blocks: String = row.get("blocks");
    Ok(Page {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        blocks: parse_blocks(&blocks)?,
        content_html: row.get("content_html"),
        status: status.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn create_postgres(pool: &PgPool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let row = sqlx::query(
        "INSERT INTO pages (slug, title, blocks, content_html, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(&page.slug)
    .bind(&page.title)
    .bind(serde_json::to_string(&page.blocks)?)
    .bind(&page.content_html)
    .bind(page.status.to_string())
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: row.get("id"),
        created_at: now,
        updated_at: now,
        ..page.clone()
    })
}

fn row_to_page_postgres(row: &sqlx::postgres::PgRow) -> Result<Page> {
    let status: String = row.get("status");
    let blocks: String = row.get("blocks");
    Ok(Page {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        blocks: parse_blocks(&blocks)?,
        content_html: row.get("content_html"),
        status: status.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxPageRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxPageRepository::new(pool)
    }

    fn page(slug: &str) -> Page {
        Page::new(
            slug.into(),
            format!("Page {}", slug),
            vec![
                Block::Heading {
                    text: "Welcome".into(),
                    level: 1,
                },
                Block::Paragraph { text: "Hello".into() },
            ],
            "<h1>Welcome</h1>".into(),
        )
    }

    #[tokio::test]
    async fn test_blocks_survive_storage() {
        let repo = setup_test_repo().await;
        let created = repo.create(&page("about")).await.unwrap();

        let found = repo.get_by_slug("about").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.blocks, created.blocks);
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let repo = setup_test_repo().await;
        repo.create(&page("draft")).await.unwrap();
        let mut published = page("live");
        published.status = ContentStatus::Published;
        repo.create(&published).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let live = repo.list(Some(ContentStatus::Published)).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].slug, "live");
    }

    #[tokio::test]
    async fn test_update_exists_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&page("contact")).await.unwrap();

        created.blocks = vec![Block::Spacer { height: 10 }];
        created.slug = "contact-us".into();
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.blocks, vec![Block::Spacer { height: 10 }]);

        assert!(repo.exists_by_slug("contact-us", None).await.unwrap());
        assert!(!repo.exists_by_slug("contact-us", Some(created.id)).await.unwrap());
        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
