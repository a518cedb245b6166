//! Navigation item repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NavItem, NavItemTree};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait NavItemRepository: Send + Sync {
    async fn create(&self, item: &NavItem) -> Result<NavItem>;
    async fn get_by_id(&self, id: i64) -> Result<Option<NavItem>>;
    async fn list(&self) -> Result<Vec<NavItem>>;
    async fn list_visible(&self) -> Result<Vec<NavItem>>;
    async fn list_tree(&self) -> Result<Vec<NavItemTree>>;
    /// Visible items only; children of a hidden item are hidden with it
    async fn list_visible_tree(&self) -> Result<Vec<NavItemTree>>;
    async fn update(&self, item: &NavItem) -> Result<NavItem>;
    async fn update_order(&self, id: i64, parent_id: Option<i64>, sort_order: i32) -> Result<()>;
    /// Delete an item and its descendants
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn count(&self) -> Result<i64>;
}

pub struct SqlxNavItemRepository {
    pool: DynDatabasePool,
}

impl SqlxNavItemRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NavItemRepository> {
        Arc::new(Self::new(pool))
    }
}

const COLUMNS: &str = "id, parent_id, label, url, sort_order, open_new_tab, visible";

#[async_trait]
impl NavItemRepository for SqlxNavItemRepository {
    async fn create(&self, item: &NavItem) -> Result<NavItem> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT INTO nav_items (parent_id, label, url, sort_order, open_new_tab, visible) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(item.parent_id)
            .bind(&item.label)
            .bind(&item.url)
            .bind(item.sort_order)
            .bind(item.open_new_tab)
            .bind(item.visible)
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to create nav item")?
            .last_insert_rowid(),
            DatabaseDriver::Postgres => sqlx::query(
                "INSERT INTO nav_items (parent_id, label, url, sort_order, open_new_tab, visible) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(item.parent_id)
            .bind(&item.label)
            .bind(&item.url)
            .bind(item.sort_order)
            .bind(item.open_new_tab)
            .bind(item.visible)
            .fetch_one(self.pool.postgres()?)
            .await
            .context("Failed to create nav item")?
            .get("id"),
        };
        Ok(NavItem { id, ..item.clone() })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<NavItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Postgres => get_by_id_postgres(self.pool.postgres()?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<NavItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?, false).await,
            DatabaseDriver::Postgres => list_postgres(self.pool.postgres()?, false).await,
        }
    }

    async fn list_visible(&self) -> Result<Vec<NavItem>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?, true).await,
            DatabaseDriver::Postgres => list_postgres(self.pool.postgres()?, true).await,
        }
    }

    async fn list_tree(&self) -> Result<Vec<NavItemTree>> {
        Ok(build_nav_tree(self.list().await?))
    }

    async fn list_visible_tree(&self) -> Result<Vec<NavItemTree>> {
        Ok(build_nav_tree(self.list_visible().await?))
    }

    async fn update(&self, item: &NavItem) -> Result<NavItem> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "UPDATE nav_items SET parent_id = ?, label = ?, url = ?, sort_order = ?, open_new_tab = ?, \
                     visible = ? WHERE id = ?",
                )
                .bind(item.parent_id)
                .bind(&item.label)
                .bind(&item.url)
                .bind(item.sort_order)
                .bind(item.open_new_tab)
                .bind(item.visible)
                .bind(item.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update nav item")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(
                    "UPDATE nav_items SET parent_id = $1, label = $2, url = $3, sort_order = $4, open_new_tab = $5, \
                     visible = $6 WHERE id = $7",
                )
                .bind(item.parent_id)
                .bind(&item.label)
                .bind(&item.url)
                .bind(item.sort_order)
                .bind(item.open_new_tab)
                .bind(item.visible)
                .bind(item.id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to update nav item")?;
            }
        }
        self.get_by_id(item.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Nav item not found after update"))
    }

    async fn update_order(&self, id: i64, parent_id: Option<i64>, sort_order: i32) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("UPDATE nav_items SET parent_id = ?, sort_order = ? WHERE id = ?")
                    .bind(parent_id)
                    .bind(sort_order)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update nav item order")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("UPDATE nav_items SET parent_id = $1, sort_order = $2 WHERE id = $3")
                    .bind(parent_id)
                    .bind(sort_order)
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update nav item order")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // Children go through ON DELETE CASCADE
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM nav_items WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete nav item")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM nav_items WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete nav item")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM nav_items")
                .fetch_one(self.pool.sqlite()?)
                .await?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM nav_items")
                .fetch_one(self.pool.postgres()?)
                .await?
                .get("count"),
        };
        Ok(count)
    }
}

/// Assemble a flat item list into a tree ordered by `sort_order`.
///
/// Items whose parent is missing from the list are dropped.
pub(crate) fn build_nav_tree(items: Vec<NavItem>) -> Vec<NavItemTree> {
    let mut children_map: HashMap<Option<i64>, Vec<NavItem>> = HashMap::new();
    for item in items {
        children_map.entry(item.parent_id).or_default().push(item);
    }
    for children in children_map.values_mut() {
        children.sort_by_key(|item| (item.sort_order, item.id));
    }

    fn build_subtree(parent_id: Option<i64>, children_map: &mut HashMap<Option<i64>, Vec<NavItem>>) -> Vec<NavItemTree> {
        let Some(children) = children_map.remove(&parent_id) else {
            return Vec::new();
        };
        children
            .into_iter()
            .map(|item| {
                let children = build_subtree(Some(item.id), children_map);
                NavItemTree { item, children }
            })
            .collect()
    }

    build_subtree(None, &mut children_map)
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<NavItem>> {
    let sql = format!("SELECT {} FROM nav_items WHERE id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get nav item")?;
    Ok(row.map(|r| row_to_nav_item_sqlite(&r)))
}

async fn list_sqlite(pool: &SqlitePool, visible_only: bool) -> Result<Vec<NavItem>> {
    let filter = if visible_only { "WHERE visible = 1" } else { "" };
    let sql = format!("SELECT {} FROM nav_items {} ORDER BY sort_order, id", COLUMNS, filter);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list nav items")?;
    Ok(rows.iter().map(row_to_nav_item_sqlite).collect())
}

fn row_to_nav_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> NavItem {
    NavItem {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        label: row.get("label"),
        url: row.get("url"),
        sort_order: row.get("sort_order"),
        open_new_tab: row.get("open_new_tab"),
        visible: row.get("visible"),
    }
}

async fn get_by_id_postgres(pool: &PgPool, id: i64) -> Result<Option<NavItem>> {
    let sql = format!("SELECT {} FROM nav_items WHERE id = $1", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get nav item")?;
    Ok(row.map(|r| row_to_nav_item_postgres(&r)))
}

async fn list_postgres(pool: &PgPool, visible_only: bool) -> Result<Vec<NavItem>> {
    let filter = if visible_only { "WHERE visible = TRUE" } else { "" };
    let sql = format!("SELECT {} FROM nav_items {} ORDER BY sort_order, id", COLUMNS, filter);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list nav items")?;
    Ok(rows.iter().map(row_to_nav_item_postgres).collect())
}

fn row_to_nav_item_postgres(row: &sqlx::postgres::PgRow) -> NavItem {
    NavItem {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        label: row.get("label"),
        url: row.get("url"),
        sort_order: row.get("sort_order"),
        open_new_tab: row.get("open_new_tab"),
        visible: row.get("visible"),
    }
}
