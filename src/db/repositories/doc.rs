//! Documentation repository
//!
//! Docs are ordered by section, then `sort_order`. The table of contents is
//! stored as JSON text next to the rendered HTML.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ContentStatus, Doc, TocEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait DocRepository: Send + Sync {
    async fn create(&self, doc: &Doc) -> Result<Doc>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Doc>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Doc>>;
    /// List docs in section order, optionally filtered by status
    async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Doc>>;
    async fn update(&self, doc: &Doc) -> Result<Doc>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxDocRepository {
    pool: DynDatabasePool,
}

impl SqlxDocRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str =
    "id, slug, title, section, content, content_html, toc, sort_order, status, created_at, updated_at";

const ORDER: &str = "ORDER BY section, sort_order, id";

#[async_trait]
impl DocRepository for SqlxDocRepository {
    async fn create(&self, doc: &Doc) -> Result<Doc> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, doc).await,
            DatabaseDriver::Postgres => create_postgres(self.pool.postgres()?, doc).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Doc>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM docs WHERE id = ?", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get doc")?;
                row.map(|r| row_to_doc_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM docs WHERE id = $1", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get doc")?;
                row.map(|r| row_to_doc_postgres(&r)).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Doc>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM docs WHERE slug = ?", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get doc by slug")?;
                row.map(|r| row_to_doc_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM docs WHERE slug = $1", COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get doc by slug")?;
                row.map(|r| row_to_doc_postgres(&r)).transpose()
            }
        }
    }

    async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Doc>> {
        let status = status.map(|s| s.to_string());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM docs WHERE status = ? {}", COLUMNS, ORDER),
                    None => format!("SELECT {} FROM docs {}", COLUMNS, ORDER),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list docs")?;
                rows.iter().map(row_to_doc_sqlite).collect()
            }
            DatabaseDriver::Postgres => {
                let sql = match status {
                    Some(_) => format!("SELECT {} FROM docs WHERE status = $1 {}", COLUMNS, ORDER),
                    None => format!("SELECT {} FROM docs {}", COLUMNS, ORDER),
                };
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to list docs")?;
                rows.iter().map(row_to_doc_postgres).collect()
            }
        }
    }

    async fn update(&self, doc: &Doc) -> Result<Doc> {
        let toc = serde_json::to_string(&doc.toc)?;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "UPDATE docs SET slug = ?, title = ?, section = ?, content = ?, content_html = ?, toc = ?, \
                     sort_order = ?, status = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&doc.slug)
                .bind(&doc.title)
                .bind(&doc.section)
                .bind(&doc.content)
                .bind(&doc.content_html)
                .bind(&toc)
                .bind(doc.sort_order)
                .bind(doc.status.to_string())
                .bind(Utc::now())
                .bind(doc.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update doc")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "UPDATE docs SET slug = $1, title = $2, section = $3, content = $4, content_html = $5, toc = $6, \
                     sort_order = $7, status = $8, updated_at = $9 WHERE id = $10",
                )
                .bind(&doc.slug)
                .bind(&doc.title)
                .bind(&doc.section)
                .bind(&doc.content)
                .bind(&doc.content_html)
                .bind(&toc)
                .bind(doc.sort_order)
                .bind(doc.status.to_string())
                .bind(Utc::now())
                .bind(doc.id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to update doc")?;
            }
        }
        self.get_by_id(doc.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Doc not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM docs WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete doc")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM docs WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete doc")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM docs WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM docs WHERE slug = $1 AND id != $2")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.postgres()?)
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }
}

fn parse_toc(raw: &str) -> Result<Vec<TocEntry>> {
    serde_json::from_str(raw).context("Stored table of contents is not valid JSON")
}

async fn create_sqlite(pool: &SqlitePool, doc: &Doc) -> Result<Doc> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO docs (slug, title, section, content, content_html, toc, sort_order, status, created_at, \
         updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&doc.slug)
    .bind(&doc.title)
    .bind(&doc.section)
    .bind(&doc.content)
    .bind(&doc.content_html)
    .bind(serde_json::to_string(&doc.toc)?)
    .bind(doc.sort_order)
    .bind(doc.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create doc")?;

    Ok(Doc {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..doc.clone()
    })
}

fn row_to_doc_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Doc> {
    let status: String = row.get("status");
    let toc: String = row.get("toc");
    Ok(Doc {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        section: row.get("section"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        toc: parse_toc(&toc)?,
        sort_order: row.get("sort_order"),
        status: status.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn create_postgres(pool: &PgPool, doc: &Doc) -> Result<Doc> {
    let now = Utc::now();
    let row = sqlx::query(
        "INSERT INTO docs (slug, title, section, content, content_html, toc, sort_order, status, created_at, \
         updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
    )
    .bind(&doc.slug)
    .bind(&doc.title)
    .bind(&doc.section)
    .bind(&doc.content)
    .bind(&doc.content_html)
    .bind(serde_json::to_string(&doc.toc)?)
    .bind(doc.sort_order)
    .bind(doc.status.to_string())
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create doc")?;

    Ok(Doc {
        id: row.get("id"),
        created_at: now,
        updated_at: now,
        ..doc.clone()
    })
}

fn row_to_doc_postgres(row: &sqlx::postgres::PgRow) -> Result<Doc> {
    let status: String = row.get("status");
    let toc: String = row.get("toc");
    Ok(Doc {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        section: row.get("section"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        toc: parse_toc(&toc)?,
        sort_order: row.get("sort_order"),
        status: status.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxDocRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxDocRepository::new(pool)
    }

    fn doc(slug: &str, section: &str, sort_order: i32) -> Doc {
        let now = Utc::now();
        Doc {
            id: 0,
            slug: slug.into(),
            title: slug.into(),
            section: section.into(),
            content: "## Intro".into(),
            content_html: "<h2 id=\"intro\">Intro</h2>".into(),
            toc: vec![TocEntry {
                level: 2,
                text: "Intro".into(),
                id: "intro".into(),
            }],
            sort_order,
            status: ContentStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_section_then_position() {
        let repo = setup_test_repo().await;
        repo.create(&doc("config", "guide", 2)).await.unwrap();
        repo.create(&doc("install", "guide", 1)).await.unwrap();
        repo.create(&doc("api", "api", 1)).await.unwrap();

        let slugs: Vec<String> = repo.list(None).await.unwrap().into_iter().map(|d| d.slug).collect();
        assert_eq!(slugs, vec!["api", "install", "config"]);
    }

    #[tokio::test]
    async fn test_toc_round_trips_and_update() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&doc("intro", "guide", 0)).await.unwrap();

        let found = repo.get_by_slug("intro").await.unwrap().unwrap();
        assert_eq!(found.toc, created.toc);

        created.status = ContentStatus::Draft;
        created.toc.clear();
        let updated = repo.update(&created).await.unwrap();
        assert!(updated.toc.is_empty());
        assert!(repo.list(Some(ContentStatus::Published)).await.unwrap().is_empty());

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.exists_by_slug("intro", None).await.unwrap());
    }
}
