//! Markdown rendering service
//!
//! Markdown to HTML conversion with syntax highlighting for fenced code
//! blocks. Uses pulldown-cmark for parsing and syntect for highlighting.
//!
//! # Example
//!
//! ```
//! use notwp::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Hello World\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;
use std::sync::Arc;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::models::TocEntry;
use crate::services::slug::slugify;

/// A thread-safe Markdown renderer with syntax highlighting support.
///
/// Supports tables, strikethrough, task lists and smart punctuation in
/// addition to CommonMark.
#[derive(Clone)]
pub struct MarkdownRenderer {
    syntax_set: Arc<SyntaxSet>,
    theme_set: Arc<ThemeSet>,
    theme_name: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Creates a renderer using the "base16-ocean.dark" highlighting theme.
    pub fn new() -> Self {
        Self::with_theme("base16-ocean.dark")
    }

    /// Creates a renderer with a specific syntect theme.
    ///
    /// Falls back to "base16-ocean.dark" if the theme is not found.
    pub fn with_theme(theme_name: &str) -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();

        let validated_theme = if theme_set.themes.contains_key(theme_name) {
            theme_name.to_string()
        } else {
            "base16-ocean.dark".to_string()
        };

        Self {
            syntax_set: Arc::new(syntax_set),
            theme_set: Arc::new(theme_set),
            theme_name: validated_theme,
        }
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    /// Renders Markdown text to HTML.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Renders Markdown text to HTML with raw HTML escaped instead of passed
    /// through. Used for page-builder paragraphs.
    pub fn render_escaped(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options()).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);
        html_output
    }

    /// Renders Markdown to HTML, giving every heading an anchor id, and
    /// returns the table of contents built from those headings.
    ///
    /// Ids are slugs of the heading text; repeated headings get `-1`, `-2`
    /// suffixes.
    pub fn render_with_toc(&self, markdown: &str) -> (String, Vec<TocEntry>) {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut toc = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut output: Vec<Event> = Vec::with_capacity(events.len());
        let mut heading: Option<Vec<Event>> = None;

        for event in events {
            match event {
                Event::Start(Tag::Heading { .. }) => {
                    heading = Some(Vec::new());
                }
                Event::End(TagEnd::Heading(level)) => {
                    let inner = heading.take().unwrap_or_default();
                    let text = plain_text_of(&inner);
                    let id = unique_anchor(&slugify(&text), &mut seen);
                    let level = level as u8;

                    let mut inner_html = String::new();
                    html::push_html(&mut inner_html, inner.into_iter());
                    output.push(Event::Html(
                        format!("<h{0} id=\"{1}\">{2}</h{0}>\n", level, id, inner_html).into(),
                    ));

                    toc.push(TocEntry {
                        level,
                        text: text.trim().to_string(),
                        id,
                    });
                }
                other => match heading.as_mut() {
                    Some(buffer) => buffer.push(other),
                    None => output.push(other),
                },
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, output.into_iter());
        (html_output, toc)
    }

    /// Extracts plain text from Markdown, collapsed to single spaces and cut
    /// at `max_chars` on a word boundary. Used for automatic excerpts.
    pub fn plain_text(&self, markdown: &str, max_chars: usize) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut text = String::new();
        for event in parser {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell) => {
                    text.push(' ')
                }
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }

        let cut: String = collapsed.chars().take(max_chars).collect();
        let cut = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", cut.trim_end())
    }

    /// Processes parser events, applying syntax highlighting to code blocks.
    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut in_code_block = false;
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_content.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let highlighted = match code_lang.take() {
                        Some(lang) => self.highlight_code(&code_content, &lang),
                        None => plain_code_block(&code_content, None),
                    };
                    events.push(Event::Html(highlighted.into()));
                }
                Event::Text(text) if in_code_block => {
                    code_content.push_str(&text);
                }
                _ => events.push(event),
            }
        }

        events
    }

    /// Applies syntax highlighting to a code block, or renders it plain with
    /// a language class when the language is not recognized.
    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang));

        match syntax {
            Some(syntax) => {
                let theme = &self.theme_set.themes[&self.theme_name];
                highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
                    .unwrap_or_else(|_| plain_code_block(code, None))
            }
            None => plain_code_block(code, Some(lang)),
        }
    }
}

fn plain_code_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>", html_escape(code)),
    }
}

fn plain_text_of(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        if let Event::Text(t) | Event::Code(t) = event {
            text.push_str(t);
        }
    }
    text
}

fn unique_anchor(base: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(base.to_string()).or_insert(0);
    let id = if *count == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, count)
    };
    *count += 1;
    id
}

/// Escapes HTML special characters in a string.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
