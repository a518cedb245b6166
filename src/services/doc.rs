//! Documentation service
//!
//! Docs are Markdown pages grouped into sections. Rendering adds anchor ids
//! to headings and stores the resulting table of contents with the doc.

use crate::cache::{keys, Cache, CacheLayer};
use crate::db::repositories::DocRepository;
use crate::models::{ContentStatus, CreateDocInput, Doc, DocSection, DocSummary, UpdateDocInput};
use crate::services::content::{parse_status, require_title, resolve_slug, ContentError};
use crate::services::markdown::MarkdownRenderer;
use chrono::Utc;
use std::sync::Arc;

/// Section used when none is given
pub const DEFAULT_SECTION: &str = "General";

pub struct DocService {
    repo: Arc<dyn DocRepository>,
    cache: Arc<Cache>,
    markdown: Arc<MarkdownRenderer>,
}

impl DocService {
    pub fn new(repo: Arc<dyn DocRepository>, cache: Arc<Cache>, markdown: Arc<MarkdownRenderer>) -> Self {
        Self { repo, cache, markdown }
    }

    pub async fn create(&self, input: CreateDocInput) -> Result<Doc, ContentError> {
        let title = require_title(&input.title)?;
        let status = parse_status(input.status.as_deref())?.unwrap_or_default();

        let repo = self.repo.clone();
        let slug = resolve_slug(&title, input.slug.as_deref(), |s| {
            let repo = repo.clone();
            async move { repo.exists_by_slug(&s, None).await }
        })
        .await?;

        let (content_html, toc) = self.markdown.render_with_toc(&input.content);
        let now = Utc::now();
        let doc = Doc {
            id: 0,
            slug,
            title,
            section: section_name(&input.section),
            content: input.content,
            content_html,
            toc,
            sort_order: input.sort_order,
            status,
            created_at: now,
            updated_at: now,
        };

        let doc = self.repo.create(&doc).await?;
        self.invalidate(&doc.slug).await;
        Ok(doc)
    }

    pub async fn get(&self, id: i64) -> Result<Doc, ContentError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("Doc {}", id)))
    }

    /// Published doc by slug, cached
    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Doc, ContentError> {
        let key = keys::doc(slug);
        if let Some(doc) = self.cache.get::<Doc>(&key).await.ok().flatten() {
            return Ok(doc);
        }

        let doc = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|d| d.status == ContentStatus::Published)
            .ok_or_else(|| ContentError::NotFound(format!("Doc '{}'", slug)))?;

        let _ = self.cache.set(&key, &doc, self.cache.default_ttl()).await;
        Ok(doc)
    }

    pub async fn list(&self, status: Option<ContentStatus>) -> Result<Vec<Doc>, ContentError> {
        Ok(self.repo.list(status).await?)
    }

    /// Published docs grouped by section, sections in first-appearance order
    pub async fn sections(&self) -> Result<Vec<DocSection>, ContentError> {
        if let Some(sections) = self.cache.get::<Vec<DocSection>>(keys::DOC_SECTIONS).await.ok().flatten() {
            return Ok(sections);
        }

        let docs = self.repo.list(Some(ContentStatus::Published)).await?;
        let sections = group_sections(&docs);
        let _ = self.cache.set(keys::DOC_SECTIONS, &sections, self.cache.default_ttl()).await;
        Ok(sections)
    }

    /// Previous and next published docs around `slug` in reading order
    pub async fn neighbors(&self, slug: &str) -> Result<(Option<DocSummary>, Option<DocSummary>), ContentError> {
        let ordered: Vec<DocSummary> = self.sections().await?.into_iter().flat_map(|s| s.docs).collect();
        let Some(pos) = ordered.iter().position(|d| d.slug == slug) else {
            return Ok((None, None));
        };
        let prev = pos.checked_sub(1).and_then(|i| ordered.get(i)).cloned();
        let next = ordered.get(pos + 1).cloned();
        Ok((prev, next))
    }

    pub async fn update(&self, id: i64, input: UpdateDocInput) -> Result<Doc, ContentError> {
        let mut doc = self.get(id).await?;
        let old_slug = doc.slug.clone();

        if let Some(title) = input.title {
            doc.title = require_title(&title)?;
        }

        if let Some(slug) = input.slug.filter(|s| s.trim() != doc.slug) {
            let repo = self.repo.clone();
            doc.slug = resolve_slug(&doc.title, Some(&slug), |s| {
                let repo = repo.clone();
                async move { repo.exists_by_slug(&s, Some(id)).await }
            })
            .await?;
        }

        if let Some(section) = input.section {
            doc.section = section_name(&section);
        }

        if let Some(content) = input.content {
            let (content_html, toc) = self.markdown.render_with_toc(&content);
            doc.content = content;
            doc.content_html = content_html;
            doc.toc = toc;
        }

        if let Some(sort_order) = input.sort_order {
            doc.sort_order = sort_order;
        }

        if let Some(status) = parse_status(input.status.as_deref())? {
            doc.status = status;
        }

        let doc = self.repo.update(&doc).await?;
        self.invalidate(&old_slug).await;
        self.invalidate(&doc.slug).await;
        Ok(doc)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentError> {
        let doc = self.get(id).await?;
        self.repo.delete(id).await?;
        self.invalidate(&doc.slug).await;
        Ok(())
    }

    async fn invalidate(&self, slug: &str) {
        let _ = self.cache.delete(&keys::doc(slug)).await;
        let _ = self.cache.delete(keys::DOC_SECTIONS).await;
    }
}

fn section_name(section: &str) -> String {
    match section.trim() {
        "" => DEFAULT_SECTION.to_string(),
        s => s.to_string(),
    }
}

/// Group docs (already ordered by section, sort order) into sections
fn group_sections(docs: &[Doc]) -> Vec<DocSection> {
    let mut sections: Vec<DocSection> = Vec::new();
    for doc in docs {
        match sections.iter_mut().find(|s| s.section == doc.section) {
            Some(section) => section.docs.push(DocSummary::from(doc)),
            None => sections.push(DocSection {
                section: doc.section.clone(),
                docs: vec![DocSummary::from(doc)],
            }),
        }
    }
    for section in &mut sections {
        section.docs.sort_by_key(|d| (d.sort_order, d.id));
    }
    sections
}
