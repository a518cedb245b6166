//! Page service
//!
//! Pages are built from blocks and served at `/{slug}`, so slugs that would
//! shadow other public routes are refused.

use crate::cache::{keys, Cache, CacheLayer};
use crate::db::repositories::PageRepository;
use crate::models::{ContentStatus, CreatePageInput, Page, UpdatePageInput};
use crate::services::blocks::render_blocks;
use crate::services::content::{parse_status, require_title, resolve_slug, ContentError};
use crate::services::markdown::MarkdownRenderer;
use std::sync::Arc;

/// First path segments owned by other routes
pub const RESERVED_SLUGS: &[&str] = &["api", "blog", "docs", "newsletter", "uploads", "static", "install"];

pub struct PageService {
    repo: Arc<dyn PageRepository>,
    cache: Arc<Cache>,
    markdown: Arc<MarkdownRenderer>,
}

impl PageService {
    pub fn new(repo: Arc<dyn PageRepository>, cache: Arc<Cache>, markdown: Arc<MarkdownRenderer>) -> Self {
        Self { repo, cache, markdown }
    }

    pub async fn create(&self, input: CreatePageInput) -> Result<Page, ContentError> {
        let title = require_title(&input.title)?;
        let status = parse_status(input.status.as_deref())?.unwrap_or_default();

        let repo = self.repo.clone();
        let slug = resolve_slug(&title, input.slug.as_deref(), |s| {
            let repo = repo.clone();
            async move { Ok::<bool, anyhow::Error>(is_reserved(&s) || repo.exists_by_slug(&s, None).await?) }
        })
        .await?;

        let content_html = render_blocks(&input.blocks, &self.markdown);
        let mut page = Page::new(slug, title, input.blocks, content_html);
        page.status = status;

        let page = self.repo.create(&page).await?;
        self.invalidate(&page.slug).await;
        tracing::info!("Created page '{}' ({})", page.slug, page.status);
        Ok(page)
    }

    pub async fn get(&self, id: i64) -> Result<Page, ContentError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("Page {}", id)))
    }

    /// Published page by slug, cached
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Page, ContentError> {
        let key = keys::page(slug);
        if let Some(page) = self.cache.get::<Page>(&key).await.ok().flatten() {
            return Ok(page);
        }

        let page = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|p| p.status == ContentStatus::Published)
            .ok_or_else(|| ContentError::NotFound(format!("Page '{}'", slug)))?;

        let _ = self.cache.set(&key, &page, self.cache.default_ttl()).await;
        Ok(page)
    }

    pub async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Page>, ContentError> {
        Ok(self.repo.list(status).await?)
    }

    pub async fn update(&self, id: i64, input: UpdatePageInput) -> Result<Page, ContentError> {
        let mut page = self.get(id).await?;
        let old_slug = page.slug.clone();

        if let Some(title) = input.title {
            page.title = require_title(&title)?;
        }

        if let Some(slug) = input.slug.filter(|s| s.trim() != page.slug) {
            let repo = self.repo.clone();
            page.slug = resolve_slug(&page.title, Some(&slug), |s| {
                let repo = repo.clone();
                async move { Ok::<bool, anyhow::Error>(is_reserved(&s) || repo.exists_by_slug(&s, Some(id)).await?) }
            })
            .await?;
        }

        if let Some(blocks) = input.blocks {
            page.content_html = render_blocks(&blocks, &self.markdown);
            page.blocks = blocks;
        }

        if let Some(status) = parse_status(input.status.as_deref())? {
            page.status = status;
        }

        let page = self.repo.update(&page).await?;
        self.invalidate(&old_slug).await;
        self.invalidate(&page.slug).await;
        Ok(page)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let page = self.get(id).await?;
        self.repo.delete(id).await?;
        self.invalidate(&page.slug).await;
        tracing::info!("Deleted page '{}'", page.slug);
        Ok(())
    }

    async fn invalidate(&self, slug: &str) {
        let _ = self.cache.delete(&keys::page(slug)).await;
    }
}

fn is_reserved(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxPageRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::Block;

    async fn setup_service() -> PageService {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        PageService::new(
            SqlxPageRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
            Arc::new(MarkdownRenderer::new()),
        )
    }

    fn input(title: &str) -> CreatePageInput {
        CreatePageInput {
            title: title.to_string(),
            slug: None,
            blocks: vec![
                Block::Heading { text: "Welcome".into(), level: 1 },
                Block::Paragraph { text: "Hello *there*".into() },
            ],
            status: Some("published".into()),
        }
    }

    #[tokio::test]
    async fn test_create_renders_blocks() {
        let service = setup_service().await;
        let page = service.create(input("About Us")).await.unwrap();

        assert_eq!(page.slug, "about-us");
        assert!(page.content_html.contains("<h1>Welcome</h1>"));
        assert!(page.content_html.contains("<em>there</em>"));

        let fetched = service.get_published_by_slug("about-us").await.unwrap();
        assert_eq!(fetched.blocks.len(), 2);
    }

    #[tokio::test]
    async fn test_reserved_slugs() {
        let service = setup_service().await;

        let mut explicit = input("Blog");
        explicit.slug = Some("blog".into());
        assert!(matches!(service.create(explicit).await, Err(ContentError::SlugConflict(_))));

        // Derived slugs step around reserved names
        let page = service.create(input("Docs")).await.unwrap();
        assert_eq!(page.slug, "docs-2");
    }

    #[tokio::test]
    async fn test_update_blocks_and_unpublish() {
        let service = setup_service().await;
        let page = service.create(input("Contact")).await.unwrap();
        service.get_published_by_slug("contact").await.unwrap();

        let updated = service
            .update(
                page.id,
                UpdatePageInput {
                    blocks: Some(vec![Block::Button { label: "Mail".into(), href: "mailto:a@example.com".into() }]),
                    status: Some("draft".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.content_html.contains("mailto:a@example.com"));
        assert!(matches!(
            service.get_published_by_slug("contact").await,
            Err(ContentError::NotFound(_))
        ));
        assert_eq!(service.list(Some(ContentStatus::Draft)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup_service().await;
        let page = service.create(input("Gone")).await.unwrap();
        service.delete(page.id).await.unwrap();
        assert!(matches!(service.get(page.id).await, Err(ContentError::NotFound(_))));
    }
}
