//! Documentation page model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentStatus;

/// One heading in a document's table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    /// Anchor id assigned to the heading
    pub id: String,
}

/// A documentation page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doc {
    pub id: i64,
    pub slug: String,
    pub title: String,
    /// Sidebar section the doc is listed under
    pub section: String,
    pub content: String,
    pub content_html: String,
    pub toc: Vec<TocEntry>,
    /// Position within the section
    pub sort_order: i32,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Published docs of one section, in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSection {
    pub section: String,
    pub docs: Vec<DocSummary>,
}

/// Sidebar entry for a doc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub sort_order: i32,
}

impl From<&Doc> for DocSummary {
    fn from(doc: &Doc) -> Self {
        Self {
            id: doc.id,
            slug: doc.slug.clone(),
            title: doc.title.clone(),
            sort_order: doc.sort_order,
        }
    }
}

/// Input for creating a doc
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub status: Option<String>,
}

/// Input for updating a doc
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub section: Option<String>,
    pub content: Option<String>,
    pub sort_order: Option<i32>,
    pub status: Option<String>,
}
