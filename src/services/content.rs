//! Shared pieces of the post, page and doc services

use crate::models::ContentStatus;
use crate::services::slug::{slugify, unique_slug};
use std::future::Future;

/// Error types for content services
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug already in use: {0}")]
    SlugConflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Parse an optional status string; absent means draft
pub(crate) fn parse_status(status: Option<&str>) -> Result<Option<ContentStatus>, ContentError> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| ContentError::ValidationError(format!("Invalid status '{}', expected draft or published", s))),
        None => Ok(None),
    }
}

pub(crate) fn require_title(title: &str) -> Result<String, ContentError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentError::ValidationError("Title cannot be empty".to_string()));
    }
    Ok(title.to_string())
}

/// Pick the slug for new or renamed content.
///
/// A requested slug is normalized and must be free; otherwise the slug is
/// derived from the title and suffixed until unused.
pub(crate) async fn resolve_slug<F, Fut>(title: &str, requested: Option<&str>, mut exists: F) -> Result<String, ContentError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(requested) => {
            let slug = slugify(requested);
            if exists(slug.clone()).await? {
                return Err(ContentError::SlugConflict(slug));
            }
            Ok(slug)
        }
        None => Ok(unique_slug(&slugify(title), exists).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some(" ")).unwrap(), None);
        assert_eq!(parse_status(Some("Published")).unwrap(), Some(ContentStatus::Published));
        assert!(matches!(parse_status(Some("archived")), Err(ContentError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_resolve_slug() {
        let taken = ["hello-world", "hello-world-2", "about"];
        let exists = |s: String| async move { Ok::<_, anyhow::Error>(taken.contains(&s.as_str())) };

        assert_eq!(resolve_slug("Hello World", None, exists).await.unwrap(), "hello-world-3");
        assert_eq!(resolve_slug("x", Some("Contact Us"), exists).await.unwrap(), "contact-us");

        let conflict = resolve_slug("x", Some("about"), exists).await;
        assert!(matches!(conflict, Err(ContentError::SlugConflict(s)) if s == "about"));
    }
}
