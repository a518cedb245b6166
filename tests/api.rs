//! End-to-end tests driving the full router

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use notwp::api::{self, AppState};
use notwp::config::{Config, DatabaseConfig, DatabaseDriver};
use notwp::db::{create_pool, create_test_pool, migrations};
use notwp::models::CreateAccountInput;
use notwp::services::{InstallWizard, LogMailer};

struct TestApp {
    server: TestServer,
    state: AppState,
    mailer: Arc<LogMailer>,
    _uploads: TempDir,
}

async fn setup() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.installed = true;
    config.upload.path = uploads.path().to_path_buf();

    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let mailer = Arc::new(LogMailer::new());
    let state = AppState::new(config, pool, mailer.clone()).unwrap();
    state.nav_service.init_defaults().await.unwrap();

    let server = TestServer::new(api::build_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        mailer,
        _uploads: uploads,
    }
}

impl TestApp {
    async fn create_account(&self, email: &str, role: &str) {
        self.state
            .account_service
            .create(CreateAccountInput {
                email: email.to_string(),
                display_name: String::new(),
                role: Some(role.to_string()),
            })
            .await
            .unwrap();
    }

    fn last_code(&self) -> String {
        let mail = self.mailer.sent().pop().expect("no mail sent");
        mail.text
            .split("code: ")
            .nth(1)
            .map(|rest| rest.chars().take_while(|c| c.is_ascii_digit()).collect())
            .expect("no code in mail")
    }

    /// Sign in through the code flow and return the session token
    async fn login(&self, email: &str) -> String {
        self.server
            .post("/api/v1/auth/request-code")
            .json(&json!({ "email": email }))
            .await
            .assert_status_ok();
        let code = self.last_code();
        let response = self
            .server
            .post("/api/v1/auth/verify-code")
            .json(&json!({ "email": email, "code": code }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"]["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.create_account("admin@example.com", "admin").await;
        self.login("admin@example.com").await
    }
}

#[tokio::test]
async fn test_public_site_and_nav() {
    let app = setup().await;

    let site = app.server.get("/api/v1/site").await;
    site.assert_status_ok();
    let body = site.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["site_name"], "NotWP");

    let nav = app.server.get("/api/v1/nav").await.json::<Value>();
    let labels: Vec<&str> = nav["data"].as_array().unwrap().iter().map(|i| i["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["Home", "Blog", "Docs"]);
}

#[tokio::test]
async fn test_login_flow() {
    let app = setup().await;
    app.create_account("editor@example.com", "editor").await;

    let response = app.server.get("/api/v1/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

    // unknown addresses get the same answer and no mail
    app.server
        .post("/api/v1/auth/request-code")
        .json(&json!({ "email": "stranger@example.com" }))
        .await
        .assert_status_ok();
    assert!(app.mailer.sent().is_empty());

    let token = app.login("editor@example.com").await;
    let me = app.server.get("/api/v1/auth/me").authorization_bearer(&token).await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["data"]["email"], "editor@example.com");

    app.server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    app.server
        .get("/api/v1/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_code_rejected() {
    let app = setup().await;
    app.create_account("editor@example.com", "editor").await;
    app.server
        .post("/api/v1/auth/request-code")
        .json(&json!({ "email": "editor@example.com" }))
        .await
        .assert_status_ok();
    let code = app.last_code();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let response = app
        .server
        .post("/api/v1/auth/verify-code")
        .json(&json!({ "email": "editor@example.com", "code": wrong }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn test_code_requests_are_rate_limited() {
    let app = setup().await;
    app.create_account("editor@example.com", "editor").await;
    for _ in 0..3 {
        app.server
            .post("/api/v1/auth/request-code")
            .json(&json!({ "email": "editor@example.com" }))
            .await
            .assert_status_ok();
    }
    let response = app
        .server
        .post("/api/v1/auth/request-code")
        .json(&json!({ "email": "editor@example.com" }))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = setup().await;
    let token = app.admin_token().await;

    let created = app
        .server
        .post("/api/v1/admin/posts")
        .authorization_bearer(&token)
        .json(&json!({ "title": "Hello World", "content": "# Hi\n\nFirst **post**", "status": "published" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let post = created.json::<Value>()["data"].clone();
    assert_eq!(post["slug"], "hello-world");
    assert!(post["content_html"].as_str().unwrap().contains("<strong>post</strong>"));

    let conflict = app
        .server
        .post("/api/v1/admin/posts")
        .authorization_bearer(&token)
        .json(&json!({ "title": "Other", "slug": "hello-world" }))
        .await;
    conflict.assert_status(StatusCode::CONFLICT);

    let list = app.server.get("/api/v1/posts").await.json::<Value>();
    assert_eq!(list["data"]["total"], 1);

    let public = app.server.get("/api/v1/posts/hello-world").await;
    public.assert_status_ok();

    let html = app.server.get("/blog/hello-world").await;
    html.assert_status_ok();
    assert!(html.text().contains("Hello World"));

    let id = post["id"].as_i64().unwrap();
    app.server
        .put(&format!("/api/v1/admin/posts/{}", id))
        .authorization_bearer(&token)
        .json(&json!({ "status": "draft" }))
        .await
        .assert_status_ok();
    app.server.get("/api/v1/posts/hello-world").await.assert_status_not_found();

    app.server
        .delete(&format!("/api/v1/admin/posts/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    app.server
        .get(&format!("/api/v1/admin/posts/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_pages_render_blocks() {
    let app = setup().await;
    let token = app.admin_token().await;

    app.server
        .post("/api/v1/admin/pages")
        .authorization_bearer(&token)
        .json(&json!({
            "title": "About",
            "status": "published",
            "blocks": [
                { "type": "heading", "text": "About <us>", "level": 1 },
                { "type": "button", "label": "Go", "href": "javascript:alert(1)" }
            ]
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let page = app.server.get("/about").await;
    page.assert_status_ok();
    let text = page.text();
    assert!(text.contains("About &lt;us&gt;"));
    assert!(!text.contains("javascript:"));

    let reserved = app
        .server
        .post("/api/v1/admin/pages")
        .authorization_bearer(&token)
        .json(&json!({ "title": "Blog", "slug": "blog" }))
        .await;
    reserved.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_docs_grouped_by_section() {
    let app = setup().await;
    let token = app.admin_token().await;

    for (title, section, order) in [("Install", "Getting Started", 1), ("Intro", "Getting Started", 0), ("Api", "Reference", 0)] {
        app.server
            .post("/api/v1/admin/docs")
            .authorization_bearer(&token)
            .json(&json!({ "title": title, "section": section, "sort_order": order, "status": "published", "content": "## Part\ntext" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let sections = app.server.get("/api/v1/docs").await.json::<Value>();
    let start = &sections["data"][0];
    assert_eq!(start["section"], "Getting Started");
    assert_eq!(start["docs"][0]["title"], "Intro");
    assert_eq!(start["docs"][1]["title"], "Install");

    let doc = app.server.get("/api/v1/docs/install").await.json::<Value>();
    assert_eq!(doc["data"]["prev"]["slug"], "intro");
    assert_eq!(doc["data"]["next"]["slug"], "api");
    assert_eq!(doc["data"]["doc"]["toc"][0]["text"], "Part");

    app.server.get("/docs/intro").await.assert_status_ok();
}

#[tokio::test]
async fn test_newsletter_flow() {
    let app = setup().await;
    let token = app.admin_token().await;

    app.server
        .post("/api/v1/newsletter/subscribe")
        .json(&json!({ "email": "Reader@Example.com", "name": "Reader" }))
        .await
        .assert_status_ok();
    app.server
        .post("/api/v1/newsletter/subscribe")
        .json(&json!({ "email": "not-an-email" }))
        .await
        .assert_status_bad_request();

    let import = app
        .server
        .post("/api/v1/admin/newsletter/subscribers/import")
        .authorization_bearer(&token)
        .text("Email,Name\nsecond@example.com,Second\nbad,Nope\nreader@example.com,Again\n")
        .await;
    import.assert_status_ok();
    let report = import.json::<Value>()["data"].clone();
    assert_eq!(report["imported"], 1);
    assert_eq!(report["skipped"], 2);

    let export = app
        .server
        .get("/api/v1/admin/newsletter/subscribers/export")
        .authorization_bearer(&token)
        .await;
    export.assert_status_ok();
    assert!(export.text().contains("second@example.com"));

    let email = app
        .server
        .post("/api/v1/admin/newsletter/emails")
        .authorization_bearer(&token)
        .json(&json!({ "subject": "Issue 1", "content": "Hello **readers**" }))
        .await
        .json::<Value>();
    let id = email["data"]["id"].as_i64().unwrap();

    let before = app.mailer.sent().len();
    let sent = app
        .server
        .post(&format!("/api/v1/admin/newsletter/emails/{}/send", id))
        .authorization_bearer(&token)
        .await;
    sent.assert_status_ok();
    assert_eq!(sent.json::<Value>()["data"]["email"]["recipient_count"], 2);
    let mails = app.mailer.sent();
    assert_eq!(mails.len() - before, 2);
    assert!(mails.last().unwrap().text.contains("/newsletter/unsubscribe?token="));

    app.server
        .post(&format!("/api/v1/admin/newsletter/emails/{}/send", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::CONFLICT);

    // follow the unsubscribe link from the last mail
    let text = mails.last().unwrap().text.clone();
    let link = text
        .split_whitespace()
        .find(|w| w.contains("/newsletter/unsubscribe?token="))
        .unwrap();
    let path = &link[link.find("/newsletter/").unwrap()..];
    let page = app.server.get(path).await;
    page.assert_status_ok();
    assert!(page.text().contains("unsubscribed"));
}

#[tokio::test]
async fn test_media_upload() {
    let app = setup().await;
    let token = app.admin_token().await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("dot.png").mime_type("image/png"),
    );
    let upload = app
        .server
        .post("/api/v1/admin/media")
        .authorization_bearer(&token)
        .multipart(form)
        .await;
    upload.assert_status(StatusCode::CREATED);
    let file = upload.json::<Value>()["data"]["files"][0].clone();
    let name = file["name"].as_str().unwrap().to_string();
    assert!(name.ends_with(".png"));

    app.server.get(&format!("/uploads/{}", name)).await.assert_status_ok();

    let rejected = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"#!/bin/sh".to_vec()).file_name("x.sh").mime_type("application/x-sh"),
    );
    app.server
        .post("/api/v1/admin/media")
        .authorization_bearer(&token)
        .multipart(rejected)
        .await
        .assert_status_bad_request();

    app.server
        .delete(&format!("/api/v1/admin/media/{}", name))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    app.server.get(&format!("/uploads/{}", name)).await.assert_status_not_found();
}

#[tokio::test]
async fn test_accounts_are_admin_only() {
    let app = setup().await;
    let admin = app.admin_token().await;
    app.create_account("editor@example.com", "editor").await;
    let editor = app.login("editor@example.com").await;

    app.server
        .get("/api/v1/admin/accounts")
        .authorization_bearer(&editor)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let list = app
        .server
        .get("/api/v1/admin/accounts")
        .authorization_bearer(&admin)
        .await
        .json::<Value>();
    assert_eq!(list["data"].as_array().unwrap().len(), 2);

    let admin_id = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["role"] == "admin")
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    app.server
        .delete(&format!("/api/v1/admin/accounts/{}", admin_id))
        .authorization_bearer(&admin)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_settings_update_and_install_locked() {
    let app = setup().await;
    let token = app.admin_token().await;

    app.server
        .put("/api/v1/admin/settings")
        .authorization_bearer(&token)
        .json(&json!({ "site_name": "My Site", "posts_per_page": 5 }))
        .await
        .assert_status_ok();
    let site = app.server.get("/api/v1/site").await.json::<Value>();
    assert_eq!(site["data"]["site_name"], "My Site");

    app.server
        .put("/api/v1/admin/settings")
        .authorization_bearer(&token)
        .json(&json!({ "posts_per_page": 0 }))
        .await
        .assert_status_bad_request();

    let home = app.server.get("/").await;
    home.assert_status_ok();
    assert!(home.text().contains("My Site"));

    let install = app.server.get("/api/v1/install/status").await;
    install.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(install.json::<Value>()["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_unknown_routes() {
    let app = setup().await;
    let html = app.server.get("/no-such-page").await;
    html.assert_status_not_found();
    assert!(html.text().contains("Page not found"));

    let api = app.server.get("/api/v1/nothing/here").await;
    api.assert_status_not_found();
    assert_eq!(api.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_install_wizard_routes() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yml");
    let wizard = Arc::new(InstallWizard::new(config_path.clone(), Config::default()));
    let mut finished = wizard.subscribe();
    let server = TestServer::new(api::build_install_router(wizard, "*")).unwrap();

    server.get("/").await.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let status = server.get("/api/v1/install/status").await.json::<Value>();
    assert_eq!(status["data"]["step"], "database");

    server.post("/api/v1/install/migrate").await.assert_status(StatusCode::CONFLICT);

    let db_url = dir.path().join("notwp.db").to_string_lossy().to_string();
    server
        .post("/api/v1/install/database")
        .json(&json!({ "driver": "sqlite", "url": db_url }))
        .await
        .assert_status_ok();
    server.post("/api/v1/install/migrate").await.assert_status_ok();
    server
        .post("/api/v1/install/site")
        .json(&json!({ "site_name": "Fresh", "site_url": "https://fresh.example" }))
        .await
        .assert_status_ok();
    server
        .post("/api/v1/install/admin")
        .json(&json!({ "email": "owner@fresh.example", "display_name": "Owner" }))
        .await
        .assert_status_ok();
    server.post("/api/v1/install/finish").await.assert_status_ok();

    assert!(*finished.borrow_and_update());
    let saved = Config::load(&config_path).unwrap();
    assert!(saved.installed);
}

#[tokio::test]
async fn test_install_migration_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let db_url = dir.path().join("notwp.db").to_string_lossy().to_string();

    // clashes with the posts table created by the second migration
    let existing = create_pool(&DatabaseConfig { driver: DatabaseDriver::Sqlite, url: db_url.clone() })
        .await
        .unwrap();
    existing.execute("CREATE TABLE posts (id INTEGER PRIMARY KEY)").await.unwrap();
    existing.close().await;

    let wizard = Arc::new(InstallWizard::new(dir.path().join("config.yml"), Config::default()));
    let server = TestServer::new(api::build_install_router(wizard, "*")).unwrap();

    server
        .post("/api/v1/install/database")
        .json(&json!({ "driver": "sqlite", "url": db_url }))
        .await
        .assert_status_ok();

    let failed = server.post("/api/v1/install/migrate").await;
    failed.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = failed.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "MIGRATION_FAILED");
    assert_eq!(body["details"]["version"], 2);
    assert_eq!(body["details"]["name"], "0002_content.sql");
    assert_eq!(body["details"]["applied"], json!(["0001_accounts.sql"]));

    let status = server.get("/api/v1/install/status").await.json::<Value>();
    assert_eq!(status["data"]["step"], "migrations");
    assert_eq!(status["data"]["migration_error"]["name"], "0002_content.sql");

    server
        .post("/api/v1/install/site")
        .json(&json!({ "site_name": "Fresh" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}
