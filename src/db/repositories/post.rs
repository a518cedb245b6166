//! Post repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ContentStatus, ListParams, Post};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    /// List posts newest first, optionally filtered by status.
    /// Returns the page of posts and the total count.
    async fn list(&self, params: &ListParams, status: Option<ContentStatus>) -> Result<(Vec<Post>, i64)>;
    /// List published posts by publication date, newest first
    async fn list_published(&self, params: &ListParams) -> Result<(Vec<Post>, i64)>;
    async fn update(&self, post: &Post) -> Result<Post>;
    /// Delete a post, returning false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
    /// Check whether a slug is taken by any post other than `exclude_id`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Postgres => create_postgres(self.pool.postgres()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Postgres => get_by_id_postgres(self.pool.postgres()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Postgres => get_by_slug_postgres(self.pool.postgres()?, slug).await,
        }
    }

    async fn list(&self, params: &ListParams, status: Option<ContentStatus>) -> Result<(Vec<Post>, i64)> {
        let status = status.map(|s| s.to_string());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?, params, status.as_deref(), "created_at").await,
            DatabaseDriver::Postgres => {
                list_postgres(self.pool.postgres()?, params, status.as_deref(), "created_at").await
            }
        }
    }

    async fn list_published(&self, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?, params, Some("published"), "published_at").await,
            DatabaseDriver::Postgres => {
                list_postgres(self.pool.postgres()?, params, Some("published"), "published_at").await
            }
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Postgres => update_postgres(self.pool.postgres()?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM posts WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM posts WHERE slug = $1 AND id != $2")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.postgres()?)
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }
}

const COLUMNS: &str = "id, slug, title, excerpt, content, content_html, cover_image, status, author_id, \
                       published_at, created_at, updated_at";

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO posts (slug, title, excerpt, content, content_html, cover_image, status, author_id, \
         published_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(post.status.to_string())
    .bind(post.author_id)
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;
    row.map(|r| row_to_post_sqlite(&r)).transpose()
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE slug = ?", COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;
    row.map(|r| row_to_post_sqlite(&r)).transpose()
}

async fn list_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
    status: Option<&str>,
    order_by: &str,
) -> Result<(Vec<Post>, i64)> {
    let filter = if status.is_some() { "WHERE status = ?" } else { "" };

    let count_sql = format!("SELECT COUNT(*) as count FROM posts {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM posts {} ORDER BY {} DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS, filter, order_by
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

async fn update_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    sqlx::query(
        "UPDATE posts SET slug = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?, \
         status = ?, published_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(post.status.to_string())
    .bind(post.published_at)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;
    get_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        status: status.parse().unwrap_or_default(),
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// Postgres implementations
async fn create_postgres(pool: &PgPool, post: &Post) -> Result<Post> {
    let now = Utc::now();
    let row = sqlx::query(
        "INSERT INTO posts (slug, title, excerpt, content, content_html, cover_image, status, author_id, \
         published_at, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(post.status.to_string())
    .bind(post.author_id)
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: row.get("id"),
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_by_id_postgres(pool: &PgPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;
    row.map(|r| row_to_post_postgres(&r)).transpose()
}

async fn get_by_slug_postgres(pool: &PgPool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE slug = $1", COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;
    row.map(|r| row_to_post_postgres(&r)).transpose()
}

async fn list_postgres(
    pool: &PgPool,
    params: &ListParams,
    status: Option<&str>,
    order_by: &str,
) -> Result<(Vec<Post>, i64)> {
    let (filter, next) = if status.is_some() { ("WHERE status = $1", 2) } else { ("", 1) };

    let count_sql = format!("SELECT COUNT(*) as count FROM posts {}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM posts {} ORDER BY {} DESC NULLS LAST, id DESC LIMIT ${} OFFSET ${}",
        COLUMNS,
        filter,
        order_by,
        next,
        next + 1
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let posts = rows.iter().map(row_to_post_postgres).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

async fn update_postgres(pool: &PgPool, post: &Post) -> Result<Post> {
    sqlx::query(
        "UPDATE posts SET slug = $1, title = $2, excerpt = $3, content = $4, content_html = $5, cover_image = $6, \
         status = $7, published_at = $8, updated_at = $9 WHERE id = $10",
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(post.status.to_string())
    .bind(post.published_at)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;
    get_by_id_postgres(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

fn row_to_post_postgres(row: &sqlx::postgres::PgRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        status: status.parse().unwrap_or_default(),
        author_id: row.get("author_id"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
