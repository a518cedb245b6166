//! Theme engine
//!
//! Renders the public HTML site with Tera.
//! - Templates are embedded in the binary from `templates/`
//! - A directory configured as `server.templates_path` may override any of them
//! - Every page gets the site settings and the visible navigation tree
//! - Render failures fall back to a minimal error page

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::NavItemTree;
use crate::services::markdown::html_escape;
use crate::services::SiteSettings;

mod error;

pub use error::ThemeError;

/// Templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Templates every installation must be able to render
pub const REQUIRED_TEMPLATES: &[&str] = &[
    "base.html",
    "home.html",
    "post.html",
    "page.html",
    "docs.html",
    "doc.html",
    "unsubscribe.html",
    "404.html",
];

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
    override_dir: Option<PathBuf>,
}

/// Variables injected into every template
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site: SiteSettings,
    pub nav: Vec<NavItemTree>,
    pub request_path: String,
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(site: SiteSettings, nav: Vec<NavItemTree>, request_path: impl Into<String>) -> Self {
        Self {
            site,
            nav,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }
}

impl ThemeEngine {
    /// Create a theme engine from the embedded templates, overridden by
    /// any `.html` files found in `override_dir`.
    pub fn new(override_dir: Option<&Path>) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_dir: override_dir.map(Path::to_path_buf),
        };
        engine.load_templates()?;
        Ok(engine)
    }

    /// Re-read the override directory
    pub fn reload_templates(&mut self) -> Result<()> {
        self.load_templates()
    }

    fn load_templates(&mut self) -> Result<()> {
        let mut templates: Vec<(String, String)> = Vec::new();

        for name in EmbeddedTemplates::iter() {
            if let Some(file) = EmbeddedTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .with_context(|| format!("Embedded template {} is not UTF-8", name))?;
                templates.push((name.to_string(), content));
            }
        }

        if let Some(dir) = &self.override_dir {
            if dir.is_dir() {
                let mut overrides = Vec::new();
                collect_templates_from_dir(dir, dir, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::debug!("Template override: {}", name);
                    templates.retain(|(existing, _)| existing != &name);
                    templates.push((name, content));
                }
            } else {
                tracing::warn!("Template directory {} does not exist, using built-in templates", dir.display());
            }
        }

        let mut tera = Tera::default();
        // URLs and paths stay readable: `/` is left as-is
        tera.set_escape_fn(html_escape);
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(error_chain(&e)))?;

        for name in REQUIRED_TEMPLATES {
            if !tera.get_template_names().any(|n| n == *name) {
                return Err(ThemeError::NotFound(name.to_string()).into());
            }
        }

        self.tera = tera;
        Ok(())
    }

    /// Render a template with an explicit context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, error_chain(&e))).into()
        })
    }

    /// Render with the standard variables added, falling back to an error
    /// page when rendering fails.
    pub fn render_page(&self, template: &str, context: &TeraContext, standard: &StandardTemplateVars) -> String {
        let mut full_context = context.clone();
        full_context.insert("site", &standard.site);
        full_context.insert("nav", &standard.nav);
        full_context.insert("request_path", &standard.request_path);
        full_context.insert("year", &standard.year);
        self.render_with_fallback(template, &full_context)
    }

    /// Render `template`, returning a minimal HTML error page on failure
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("{}", e);
                Self::simple_error_page(template, &e.to_string())
            }
        }
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Page shown when a template cannot be rendered
    fn simple_error_page(template: &str, error: &str) -> String {
        Self::error_page(
            "Template Error",
            &format!("Failed to render template: {}", template),
            error,
        )
    }

    /// Self-contained HTML error page that needs no templates
    pub fn error_page(title: &str, message: &str, detail: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{ font-family: sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        .error-box {{ border-left: 4px solid #e74c3c; padding: 20px; }}
        .details {{ color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
    <div class="error-box">
        <h1>{title}</h1>
        <p>{message}</p>
        <p class="details">{detail}</p>
    </div>
</body>
</html>"#,
            title = html_escape(title),
            message = html_escape(message),
            detail = html_escape(detail),
        )
    }
}

fn error_chain(e: &tera::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    msg
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(base_path: &Path, current_path: &Path, templates: &mut Vec<(String, String)>) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::IoError)? {
        let path = entry.map_err(ThemeError::IoError)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path).with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }
    Ok(())
}
