//! Page model
//!
//! Pages are composed from page-builder blocks instead of a single body of
//! Markdown. The block list is stored as JSON and rendered to HTML on save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentStatus;

/// A single page-builder block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Heading {
        text: String,
        #[serde(default = "default_heading_level")]
        level: u8,
    },
    /// Paragraph text is Markdown
    Paragraph { text: String },
    Image {
        src: String,
        #[serde(default)]
        alt: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Button { label: String, href: String },
    Quote {
        text: String,
        #[serde(default)]
        cite: Option<String>,
    },
    Columns { columns: Vec<Vec<Block>> },
    Spacer {
        #[serde(default = "default_spacer_height")]
        height: u32,
    },
    /// Raw HTML, inserted as-is
    Html { html: String },
}

fn default_heading_level() -> u8 {
    2
}

fn default_spacer_height() -> u32 {
    32
}

/// Page model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub blocks: Vec<Block>,
    pub content_html: String,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(slug: String, title: String, blocks: Vec<Block>, content_html: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title,
            blocks,
            content_html,
            status: ContentStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a page
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePageInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Input for updating a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePageInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub blocks: Option<Vec<Block>>,
    pub status: Option<String>,
}
