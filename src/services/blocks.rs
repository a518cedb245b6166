//! Page-builder block rendering
//!
//! Turns a page's block list into HTML. Text is escaped, paragraph Markdown
//! is rendered without raw HTML, and links/images only accept `http(s)://`,
//! root-relative, fragment and `mailto:` URLs. `Html` blocks are the only
//! way to emit markup verbatim.

use crate::models::Block;
use crate::services::markdown::{html_escape, MarkdownRenderer};

const MAX_SPACER_HEIGHT: u32 = 400;

/// Render a list of blocks to HTML
pub fn render_blocks(blocks: &[Block], renderer: &MarkdownRenderer) -> String {
    let mut html = String::new();
    for block in blocks {
        render_block(block, renderer, &mut html);
    }
    html
}

fn render_block(block: &Block, renderer: &MarkdownRenderer, out: &mut String) {
    match block {
        Block::Heading { text, level } => {
            let level = (*level).clamp(1, 6);
            out.push_str(&format!("<h{0}>{1}</h{0}>\n", level, html_escape(text)));
        }
        Block::Paragraph { text } => {
            out.push_str("<div class=\"block-text\">");
            out.push_str(&renderer.render_escaped(text));
            out.push_str("</div>\n");
        }
        Block::Image { src, alt, caption } => {
            if !is_safe_url(src) {
                tracing::debug!("Skipping image block with unsupported URL: {}", src);
                return;
            }
            out.push_str(&format!(
                "<figure class=\"block-image\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\">",
                html_escape(src),
                html_escape(alt)
            ));
            if let Some(caption) = caption.as_deref().filter(|c| !c.is_empty()) {
                out.push_str(&format!("<figcaption>{}</figcaption>", html_escape(caption)));
            }
            out.push_str("</figure>\n");
        }
        Block::Button { label, href } => {
            let href = if is_safe_url(href) { href.as_str() } else { "#" };
            out.push_str(&format!(
                "<p class=\"block-button\"><a class=\"button\" href=\"{}\">{}</a></p>\n",
                html_escape(href),
                html_escape(label)
            ));
        }
        Block::Quote { text, cite } => {
            out.push_str(&format!("<blockquote class=\"block-quote\"><p>{}</p>", html_escape(text)));
            if let Some(cite) = cite.as_deref().filter(|c| !c.is_empty()) {
                out.push_str(&format!("<cite>{}</cite>", html_escape(cite)));
            }
            out.push_str("</blockquote>\n");
        }
        Block::Columns { columns } => {
            out.push_str(&format!("<div class=\"block-columns columns-{}\">", columns.len()));
            for column in columns {
                out.push_str("<div class=\"column\">");
                for inner in column {
                    render_block(inner, renderer, out);
                }
                out.push_str("</div>");
            }
            out.push_str("</div>\n");
        }
        Block::Spacer { height } => {
            out.push_str(&format!(
                "<div class=\"block-spacer\" style=\"height:{}px\"></div>\n",
                (*height).min(MAX_SPACER_HEIGHT)
            ));
        }
        Block::Html { html } => {
            out.push_str(html);
            out.push('\n');
        }
    }
}

/// Accept `http(s)://`, root-relative paths, fragments and `mailto:` links
pub fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || url.starts_with('#')
        || (url.starts_with('/') && !url.starts_with("//"))
}
