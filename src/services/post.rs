//! Post service
//!
//! Blog posts are written in Markdown and rendered on save. Published posts
//! are served from the cache; every write invalidates the post's slug key
//! and all cached published listings.

use crate::cache::{keys, Cache, CacheLayer};
use crate::db::repositories::PostRepository;
use crate::models::{ContentStatus, CreatePostInput, ListParams, PagedResult, Post, UpdatePostInput};
use crate::services::content::{parse_status, require_title, resolve_slug, ContentError};
use crate::services::markdown::MarkdownRenderer;
use chrono::Utc;
use std::sync::Arc;

/// Length of automatically generated excerpts, in characters
const EXCERPT_CHARS: usize = 200;

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    cache: Arc<Cache>,
    markdown: Arc<MarkdownRenderer>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>, cache: Arc<Cache>, markdown: Arc<MarkdownRenderer>) -> Self {
        Self { repo, cache, markdown }
    }

    /// Render Markdown the way a saved post would be rendered
    pub fn render_preview(&self, content: &str) -> String {
        self.markdown.render(content)
    }

    pub async fn create(&self, input: CreatePostInput, author_id: Option<i64>) -> Result<Post, ContentError> {
        let title = require_title(&input.title)?;
        let status = parse_status(input.status.as_deref())?.unwrap_or_default();

        let repo = self.repo.clone();
        let slug = resolve_slug(&title, input.slug.as_deref(), |s| {
            let repo = repo.clone();
            async move { repo.exists_by_slug(&s, None).await }
        })
        .await?;

        let content_html = self.markdown.render(&input.content);
        let mut post = Post::new(slug, title, input.content, content_html);
        post.excerpt = self.excerpt_for(input.excerpt.as_deref(), &post.content);
        post.cover_image = input.cover_image.filter(|c| !c.trim().is_empty());
        post.author_id = author_id;
        post.status = status;
        if post.is_published() {
            post.published_at = Some(Utc::now());
        }

        let post = self.repo.create(&post).await?;
        self.invalidate(&post.slug).await;
        tracing::info!("Created post '{}' ({})", post.slug, post.status);
        Ok(post)
    }

    pub async fn get(&self, id: i64) -> Result<Post, ContentError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("Post {}", id)))
    }

    /// Published post by slug, cached
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Post, ContentError> {
        let key = keys::post(slug);
        if let Some(post) = self.cache.get::<Post>(&key).await.ok().flatten() {
            return Ok(post);
        }

        let post = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(Post::is_published)
            .ok_or_else(|| ContentError::NotFound(format!("Post '{}'", slug)))?;

        let _ = self.cache.set(&key, &post, self.cache.default_ttl()).await;
        Ok(post)
    }

    /// All posts for the admin, optionally filtered by status
    pub async fn list(&self, params: &ListParams, status: Option<ContentStatus>) -> Result<PagedResult<Post>, ContentError> {
        let (posts, total) = self.repo.list(params, status).await?;
        Ok(PagedResult::new(posts, total, params))
    }

    /// Published posts, newest first, cached per page
    pub async fn list_published(&self, params: &ListParams) -> Result<PagedResult<Post>, ContentError> {
        let key = keys::published_posts(params.page as i64, params.per_page as i64);
        if let Some(result) = self.cache.get::<PagedResult<Post>>(&key).await.ok().flatten() {
            return Ok(result);
        }

        let (posts, total) = self.repo.list_published(params).await?;
        let result = PagedResult::new(posts, total, params);
        let _ = self.cache.set(&key, &result, self.cache.default_ttl()).await;
        Ok(result)
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, ContentError> {
        let mut post = self.get(id).await?;
        let old_slug = post.slug.clone();

        if let Some(title) = input.title {
            post.title = require_title(&title)?;
        }

        if let Some(slug) = input.slug.filter(|s| s.trim() != post.slug) {
            let repo = self.repo.clone();
            post.slug = resolve_slug(&post.title, Some(&slug), |s| {
                let repo = repo.clone();
                async move { repo.exists_by_slug(&s, Some(id)).await }
            })
            .await?;
        }

        if let Some(content) = input.content {
            let auto_excerpt = post.excerpt == self.markdown.plain_text(&post.content, EXCERPT_CHARS);
            post.content_html = self.markdown.render(&content);
            post.content = content;
            if auto_excerpt && input.excerpt.is_none() {
                post.excerpt = self.markdown.plain_text(&post.content, EXCERPT_CHARS);
            }
        }

        if let Some(excerpt) = input.excerpt {
            post.excerpt = self.excerpt_for(Some(&excerpt), &post.content);
        }

        if let Some(cover_image) = input.cover_image {
            post.cover_image = cover_image.filter(|c| !c.trim().is_empty());
        }

        if let Some(status) = parse_status(input.status.as_deref())? {
            post.status = status;
            if status == ContentStatus::Published && post.published_at.is_none() {
                post.published_at = Some(Utc::now());
            }
        }

        let post = self.repo.update(&post).await?;
        self.invalidate(&old_slug).await;
        self.invalidate(&post.slug).await;
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let post = self.get(id).await?;
        self.repo.delete(id).await?;
        self.invalidate(&post.slug).await;
        tracing::info!("Deleted post '{}'", post.slug);
        Ok(())
    }

    fn excerpt_for(&self, excerpt: Option<&str>, content: &str) -> String {
        match excerpt.map(str::trim).filter(|e| !e.is_empty()) {
            Some(excerpt) => excerpt.to_string(),
            None => self.markdown.plain_text(content, EXCERPT_CHARS),
        }
    }

    async fn invalidate(&self, slug: &str) {
        let _ = self.cache.delete(&keys::post(slug)).await;
        let _ = self.cache.delete_pattern("posts:published:*").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxPostRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> PostService {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        PostService::new(
            SqlxPostRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
            Arc::new(MarkdownRenderer::new()),
        )
    }

    fn input(title: &str, status: Option<&str>) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            slug: None,
            excerpt: None,
            content: "# Intro\n\nSome **bold** words for the excerpt.".to_string(),
            cover_image: None,
            status: status.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_renders_and_derives_fields() {
        let service = setup_service().await;
        let post = service.create(input("Hello World", None), None).await.unwrap();

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.status, ContentStatus::Draft);
        assert!(post.published_at.is_none());
        assert!(post.content_html.contains("<strong>bold</strong>"));
        assert_eq!(post.excerpt, "Intro Some bold words for the excerpt.");
    }

    #[tokio::test]
    async fn test_auto_slugs_are_unique_but_explicit_conflicts() {
        let service = setup_service().await;
        service.create(input("Hello World", None), None).await.unwrap();
        let second = service.create(input("Hello World", None), None).await.unwrap();
        assert_eq!(second.slug, "hello-world-2");

        let mut explicit = input("Other", None);
        explicit.slug = Some("hello-world".into());
        let result = service.create(explicit, None).await;
        assert!(matches!(result, Err(ContentError::SlugConflict(_))));
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let service = setup_service().await;
        let result = service.create(input("   ", None), None).await;
        assert!(matches!(result, Err(ContentError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_published_at_set_on_first_publish_only() {
        let service = setup_service().await;
        let post = service.create(input("Draft", None), None).await.unwrap();

        let published = service
            .update(post.id, UpdatePostInput { status: Some("published".into()), ..Default::default() })
            .await
            .unwrap();
        let first = published.published_at.expect("published_at set");

        service
            .update(post.id, UpdatePostInput { status: Some("draft".into()), ..Default::default() })
            .await
            .unwrap();
        let republished = service
            .update(post.id, UpdatePostInput { status: Some("published".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(republished.published_at, Some(first));
    }

    #[tokio::test]
    async fn test_published_lookup_hides_drafts_and_tracks_updates() {
        let service = setup_service().await;
        let draft = service.create(input("Secret", None), None).await.unwrap();
        assert!(matches!(
            service.get_published_by_slug("secret").await,
            Err(ContentError::NotFound(_))
        ));

        let post = service.create(input("Public", Some("published")), None).await.unwrap();
        assert_eq!(service.get_published_by_slug("public").await.unwrap().id, post.id);

        // Cached value is replaced after an update
        service
            .update(post.id, UpdatePostInput { title: Some("Public v2".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(service.get_published_by_slug("public").await.unwrap().title, "Public v2");

        let listing = service.list_published(&ListParams::default()).await.unwrap();
        assert_eq!(listing.total, 1);

        service.delete(post.id).await.unwrap();
        assert!(service.get_published_by_slug("public").await.is_err());
        assert_eq!(service.list_published(&ListParams::default()).await.unwrap().total, 0);

        let all = service.list(&ListParams::default(), None).await.unwrap();
        assert_eq!(all.items.len(), 1);
        assert_eq!(all.items[0].id, draft.id);
    }

    #[tokio::test]
    async fn test_update_slug_conflict_ignores_self() {
        let service = setup_service().await;
        let a = service.create(input("A", None), None).await.unwrap();
        service.create(input("B", None), None).await.unwrap();

        let same = service
            .update(a.id, UpdatePostInput { slug: Some("a".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(same.slug, "a");

        let result = service
            .update(a.id, UpdatePostInput { slug: Some("b".into()), ..Default::default() })
            .await;
        assert!(matches!(result, Err(ContentError::SlugConflict(_))));
    }

    #[tokio::test]
    async fn test_manual_excerpt_survives_content_edit() {
        let service = setup_service().await;
        let mut create = input("Excerpted", None);
        create.excerpt = Some("Hand written".into());
        let post = service.create(create, None).await.unwrap();

        let updated = service
            .update(post.id, UpdatePostInput { content: Some("New body".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.excerpt, "Hand written");
        assert!(updated.content_html.contains("New body"));
    }

    #[tokio::test]
    async fn test_missing_post() {
        let service = setup_service().await;
        assert!(matches!(service.get(42).await, Err(ContentError::NotFound(_))));
        assert!(matches!(service.delete(42).await, Err(ContentError::NotFound(_))));
    }
}
