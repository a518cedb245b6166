//! Navigation item service
//!
//! Items form a tree through `parent_id`. A parent must exist and an item
//! can never end up below itself, whether moved directly or via reorder.

use crate::cache::{keys, Cache, CacheLayer};
use crate::db::repositories::NavItemRepository;
use crate::models::{CreateNavItemInput, NavItem, NavItemTree, NavOrderItem, UpdateNavItemInput};
use std::collections::HashMap;
use std::sync::Arc;

/// Items seeded into an empty menu
const DEFAULT_ITEMS: [(&str, &str); 3] = [("Home", "/"), ("Blog", "/blog"), ("Docs", "/docs")];

#[derive(Debug, thiserror::Error)]
pub enum NavItemError {
    #[error("Nav item not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NavItemService {
    repo: Arc<dyn NavItemRepository>,
    cache: Arc<Cache>,
}

impl NavItemService {
    pub fn new(repo: Arc<dyn NavItemRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, input: CreateNavItemInput) -> Result<NavItem, NavItemError> {
        let (label, url) = validate_fields(&input.label, &input.url)?;
        if let Some(parent_id) = input.parent_id {
            self.require(parent_id).await?;
        }

        let mut item = NavItem::new(label, url);
        item.parent_id = input.parent_id;
        item.open_new_tab = input.open_new_tab;
        item.sort_order = input.sort_order;
        item.visible = input.visible;

        let item = self.repo.create(&item).await?;
        self.invalidate().await;
        Ok(item)
    }

    pub async fn get(&self, id: i64) -> Result<NavItem, NavItemError> {
        self.require(id).await
    }

    pub async fn list(&self) -> Result<Vec<NavItem>, NavItemError> {
        Ok(self.repo.list().await?)
    }

    pub async fn list_tree(&self) -> Result<Vec<NavItemTree>, NavItemError> {
        Ok(self.repo.list_tree().await?)
    }

    /// Public menu, cached
    pub async fn list_visible_tree(&self) -> Result<Vec<NavItemTree>, NavItemError> {
        if let Some(tree) = self.cache.get::<Vec<NavItemTree>>(keys::NAV_VISIBLE).await.ok().flatten() {
            return Ok(tree);
        }
        let tree = self.repo.list_visible_tree().await?;
        let _ = self.cache.set(keys::NAV_VISIBLE, &tree, self.cache.default_ttl()).await;
        Ok(tree)
    }

    pub async fn update(&self, id: i64, input: UpdateNavItemInput) -> Result<NavItem, NavItemError> {
        let mut item = self.require(id).await?;

        if let Some(parent_id) = input.parent_id {
            if let Some(parent_id) = parent_id {
                let mut parents = self.parent_map().await?;
                parents.insert(id, Some(parent_id));
                if !parents.contains_key(&parent_id) {
                    return Err(NavItemError::ValidationError(format!("Parent item {} does not exist", parent_id)));
                }
                if creates_cycle(&parents, id) {
                    return Err(NavItemError::ValidationError("An item cannot be placed under itself".to_string()));
                }
            }
            item.parent_id = parent_id;
        }

        let (label, url) = validate_fields(
            input.label.as_deref().unwrap_or(&item.label),
            input.url.as_deref().unwrap_or(&item.url),
        )?;
        item.label = label;
        item.url = url;

        if let Some(open_new_tab) = input.open_new_tab {
            item.open_new_tab = open_new_tab;
        }
        if let Some(sort_order) = input.sort_order {
            item.sort_order = sort_order;
        }
        if let Some(visible) = input.visible {
            item.visible = visible;
        }

        let item = self.repo.update(&item).await?;
        self.invalidate().await;
        Ok(item)
    }

    /// Apply a batch of parent/order changes after validating the result
    pub async fn update_order(&self, items: Vec<NavOrderItem>) -> Result<(), NavItemError> {
        let mut parents = self.parent_map().await?;
        for item in &items {
            if !parents.contains_key(&item.id) {
                return Err(NavItemError::NotFound(item.id));
            }
            parents.insert(item.id, item.parent_id);
        }
        for item in &items {
            if let Some(parent_id) = item.parent_id {
                if !parents.contains_key(&parent_id) {
                    return Err(NavItemError::ValidationError(format!("Parent item {} does not exist", parent_id)));
                }
            }
            if creates_cycle(&parents, item.id) {
                return Err(NavItemError::ValidationError("An item cannot be placed under itself".to_string()));
            }
        }

        for item in items {
            self.repo.update_order(item.id, item.parent_id, item.sort_order).await?;
        }
        self.invalidate().await;
        Ok(())
    }

    /// Delete an item together with its children
    pub async fn delete(&self, id: i64) -> Result<(), NavItemError> {
        if !self.repo.delete(id).await? {
            return Err(NavItemError::NotFound(id));
        }
        self.invalidate().await;
        Ok(())
    }

    /// Seed the default menu when there are no items at all
    pub async fn init_defaults(&self) -> Result<(), NavItemError> {
        if self.repo.count().await? > 0 {
            return Ok(());
        }
        for (order, (label, url)) in DEFAULT_ITEMS.iter().enumerate() {
            let mut item = NavItem::new(*label, *url);
            item.sort_order = order as i32;
            self.repo.create(&item).await?;
        }
        self.invalidate().await;
        tracing::info!("Seeded default navigation");
        Ok(())
    }

    async fn require(&self, id: i64) -> Result<NavItem, NavItemError> {
        self.repo.get_by_id(id).await?.ok_or(NavItemError::NotFound(id))
    }

    async fn parent_map(&self) -> Result<HashMap<i64, Option<i64>>, NavItemError> {
        Ok(self.repo.list().await?.into_iter().map(|i| (i.id, i.parent_id)).collect())
    }

    async fn invalidate(&self) {
        let _ = self.cache.delete(keys::NAV_VISIBLE).await;
    }
}

fn validate_fields(label: &str, url: &str) -> Result<(String, String), NavItemError> {
    let label = label.trim();
    let url = url.trim();
    if label.is_empty() {
        return Err(NavItemError::ValidationError("Label cannot be empty".to_string()));
    }
    if url.is_empty() {
        return Err(NavItemError::ValidationError("URL cannot be empty".to_string()));
    }
    Ok((label.to_string(), url.to_string()))
}

/// Walk up from `start`; true if the walk comes back to an item already seen
fn creates_cycle(parents: &HashMap<i64, Option<i64>>, start: i64) -> bool {
    let mut seen = vec![start];
    let mut current = parents.get(&start).copied().flatten();
    while let Some(id) = current {
        if seen.contains(&id) {
            return true;
        }
        seen.push(id);
        current = parents.get(&id).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxNavItemRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> NavItemService {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        NavItemService::new(SqlxNavItemRepository::boxed(pool), create_cache(&CacheConfig::default()))
    }

    fn input(label: &str, parent_id: Option<i64>) -> CreateNavItemInput {
        CreateNavItemInput {
            parent_id,
            label: label.to_string(),
            url: format!("/{}", label.to_lowercase()),
            open_new_tab: false,
            sort_order: 0,
            visible: true,
        }
    }

    #[tokio::test]
    async fn test_init_defaults_once() {
        let service = setup_service().await;
        service.init_defaults().await.unwrap();
        service.init_defaults().await.unwrap();

        let items = service.list().await.unwrap();
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Home", "Blog", "Docs"]);
        assert_eq!(items[1].url, "/blog");
    }

    #[tokio::test]
    async fn test_parent_must_exist() {
        let service = setup_service().await;
        let result = service.create(input("Orphan", Some(99))).await;
        assert!(matches!(result, Err(NavItemError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_cannot_nest_under_self_or_descendant() {
        let service = setup_service().await;
        let root = service.create(input("Root", None)).await.unwrap();
        let child = service.create(input("Child", Some(root.id))).await.unwrap();

        let own = service
            .update(root.id, UpdateNavItemInput { parent_id: Some(Some(root.id)), ..Default::default() })
            .await;
        assert!(matches!(own, Err(NavItemError::ValidationError(_))));

        let loop_ = service
            .update(root.id, UpdateNavItemInput { parent_id: Some(Some(child.id)), ..Default::default() })
            .await;
        assert!(matches!(loop_, Err(NavItemError::ValidationError(_))));

        let reorder = service
            .update_order(vec![NavOrderItem { id: root.id, parent_id: Some(child.id), sort_order: 0 }])
            .await;
        assert!(matches!(reorder, Err(NavItemError::ValidationError(_))));

        // Moving back to the top level is fine
        let moved = service
            .update(child.id, UpdateNavItemInput { parent_id: Some(None), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(moved.parent_id, None);
    }

    #[tokio::test]
    async fn test_visible_tree_reflects_changes() {
        let service = setup_service().await;
        let about = service.create(input("About", None)).await.unwrap();
        service.create(input("Team", Some(about.id))).await.unwrap();

        let tree = service.list_visible_tree().await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);

        service
            .update(about.id, UpdateNavItemInput { visible: Some(false), ..Default::default() })
            .await
            .unwrap();
        assert!(service.list_visible_tree().await.unwrap().is_empty());
        assert_eq!(service.list_tree().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reorder_and_delete_cascade() {
        let service = setup_service().await;
        let a = service.create(input("A", None)).await.unwrap();
        let b = service.create(input("B", None)).await.unwrap();
        let c = service.create(input("C", Some(a.id))).await.unwrap();

        service
            .update_order(vec![
                NavOrderItem { id: a.id, parent_id: None, sort_order: 1 },
                NavOrderItem { id: b.id, parent_id: None, sort_order: 0 },
            ])
            .await
            .unwrap();
        let tree = service.list_tree().await.unwrap();
        assert_eq!(tree[0].item.label, "B");

        service.delete(a.id).await.unwrap();
        assert!(matches!(service.get(c.id).await, Err(NavItemError::NotFound(_))));
        assert!(matches!(service.delete(a.id).await, Err(NavItemError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_label_rejected() {
        let service = setup_service().await;
        let result = service.create(input("  ", None)).await;
        assert!(matches!(result, Err(NavItemError::ValidationError(_))));
    }
}
