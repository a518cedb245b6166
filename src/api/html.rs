//! Public HTML site
//!
//! - `/` and `/blog` - published posts (`?page=`)
//! - `/blog/{slug}` - a post
//! - `/docs`, `/docs/{slug}` - documentation
//! - `/newsletter/unsubscribe?token=` - one-click unsubscribe
//! - `/{slug}` - a published page
//!
//! Anything unmatched renders `404.html`.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::AppState;
use crate::models::ListParams;
use crate::services::{ContentError, SiteSettings};
use crate::theme::{StandardTemplateVars, ThemeEngine};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/blog", get(blog))
        .route("/blog/{slug}", get(post))
        .route("/docs", get(docs))
        .route("/docs/{slug}", get(doc))
        .route("/newsletter/unsubscribe", get(unsubscribe))
        .route("/{slug}", get(page))
}

/// Site settings and nav for the page chrome; failures degrade to defaults
async fn standard_vars(state: &AppState, path: &str) -> StandardTemplateVars {
    let site = match state.settings_service.get_site_settings().await {
        Ok(site) => site,
        Err(e) => {
            tracing::warn!("Using default site settings: {}", e);
            SiteSettings::default()
        }
    };
    let nav = state.nav_service.list_visible_tree().await.unwrap_or_else(|e| {
        tracing::warn!("Navigation unavailable: {}", e);
        Vec::new()
    });
    StandardTemplateVars::new(site, nav, path)
}

async fn render(state: &AppState, status: StatusCode, template: &str, context: TeraContext, path: &str) -> Response {
    let vars = standard_vars(state, path).await;
    (status, Html(state.theme_engine.render_page(template, &context, &vars))).into_response()
}

pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    render(&state, StatusCode::NOT_FOUND, "404.html", TeraContext::new(), uri.path()).await
}

/// Render a content lookup: missing content becomes the 404 page
async fn render_content<T>(
    state: &AppState,
    uri: &Uri,
    result: Result<T, ContentError>,
    template: &str,
    fill: impl FnOnce(T, &mut TeraContext),
) -> Response {
    match result {
        Ok(value) => {
            let mut context = TeraContext::new();
            fill(value, &mut context);
            render(state, StatusCode::OK, template, context, uri.path()).await
        }
        Err(ContentError::NotFound(_)) => not_found(State(state.clone()), uri.clone()).await,
        Err(e) => {
            tracing::error!("{}: {}", uri.path(), e);
            let html = ThemeEngine::error_page("Something went wrong", "This page could not be loaded.", "");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response()
        }
    }
}

async fn post_list(state: &AppState, uri: &Uri, page: Option<u32>, base_path: &str) -> Response {
    let per_page = match state.settings_service.get_site_settings().await {
        Ok(site) => site.posts_per_page,
        Err(_) => SiteSettings::default().posts_per_page,
    };
    let params = ListParams::new(page.unwrap_or(1), per_page);
    let result = state.post_service.list_published(&params).await;
    render_content(state, uri, result, "home.html", |posts, ctx| {
        ctx.insert("posts", &posts.items);
        ctx.insert("page_number", &posts.page);
        ctx.insert("total_pages", &posts.total_pages);
        ctx.insert("total", &posts.total);
        ctx.insert("base_path", base_path);
    })
    .await
}

async fn home(State(state): State<AppState>, uri: Uri, Query(query): Query<PageQuery>) -> Response {
    post_list(&state, &uri, query.page, "/").await
}

async fn blog(State(state): State<AppState>, uri: Uri, Query(query): Query<PageQuery>) -> Response {
    post_list(&state, &uri, query.page, "/blog").await
}

async fn post(State(state): State<AppState>, uri: Uri, Path(slug): Path<String>) -> Response {
    let result = state.post_service.get_published_by_slug(&slug).await;
    render_content(&state, &uri, result, "post.html", |post, ctx| ctx.insert("post", &post)).await
}

async fn page(State(state): State<AppState>, uri: Uri, Path(slug): Path<String>) -> Response {
    let result = state.page_service.get_published_by_slug(&slug).await;
    render_content(&state, &uri, result, "page.html", |page, ctx| ctx.insert("page", &page)).await
}

async fn docs(State(state): State<AppState>, uri: Uri) -> Response {
    let result = state.doc_service.sections().await;
    render_content(&state, &uri, result, "docs.html", |sections, ctx| ctx.insert("sections", &sections)).await
}

async fn doc(State(state): State<AppState>, uri: Uri, Path(slug): Path<String>) -> Response {
    let result = async {
        let doc = state.doc_service.get_published_by_slug(&slug).await?;
        let sections = state.doc_service.sections().await?;
        let (prev, next) = state.doc_service.neighbors(&doc.slug).await?;
        Ok::<_, ContentError>((doc, sections, prev, next))
    }
    .await;
    render_content(&state, &uri, result, "doc.html", |(doc, sections, prev, next), ctx| {
        ctx.insert("doc", &doc);
        ctx.insert("sections", &sections);
        ctx.insert("prev", &prev);
        ctx.insert("next", &next);
    })
    .await
}

async fn unsubscribe(State(state): State<AppState>, uri: Uri, Query(query): Query<TokenQuery>) -> Response {
    let mut context = TeraContext::new();
    let (status, success) = match state.newsletter_service.unsubscribe(query.token.trim()).await {
        Ok(subscriber) => {
            context.insert("email", &subscriber.email);
            (StatusCode::OK, true)
        }
        Err(e) => {
            tracing::debug!("Unsubscribe link rejected: {}", e);
            (StatusCode::NOT_FOUND, false)
        }
    };
    context.insert("success", &success);
    render(&state, status, "unsubscribe.html", context, uri.path()).await
}
