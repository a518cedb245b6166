//! Server lifecycle
//!
//! An uninstalled server runs only the installation wizard. When the wizard
//! finishes, the listener shuts down gracefully and the caller reloads the
//! configuration and starts the site.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::db::{self, migrations};
use crate::services::{mailer_from_config, InstallWizard};

/// How often expired sessions, login codes and rate limiter entries are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Connect, migrate, seed defaults and build the application state
pub async fn prepare(config: Config) -> Result<AppState> {
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.driver.as_str());

    let report = migrations::run_migrations(&pool).await?;
    tracing::info!(
        "Database migrations completed ({} applied, {} already applied)",
        report.applied.len(),
        report.already_applied
    );

    let mailer = mailer_from_config(&config.mail)?;
    let state = AppState::new(config, pool, mailer)?;

    state.nav_service.init_defaults().await?;
    tracing::info!("Navigation initialized");
    Ok(state)
}

/// Periodically purge expired auth state
pub fn spawn_cleanup(state: &AppState) -> tokio::task::JoinHandle<()> {
    let auth = state.auth_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match auth.cleanup_expired().await {
                Ok(report) if report.sessions + report.codes > 0 => {
                    tracing::debug!("Removed {} expired sessions and {} login codes", report.sessions, report.codes);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    })
}

/// Serve the installed site until the process ends
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let cleanup = spawn_cleanup(&state);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await;
    cleanup.abort();
    Ok(result?)
}

/// Serve the installation wizard until it finishes
pub async fn run_install(config: Config, config_path: &Path) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cors_origin = config.server.cors_origin.clone();
    let wizard = Arc::new(InstallWizard::new(config_path, config));
    let mut finished = wizard.subscribe();
    let app = api::build_install_router(wizard, &cors_origin);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("NotWP is not installed; installation wizard listening on http://{}/api/v1/install", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = finished.wait_for(|done| *done).await;
        })
        .await?;

    tracing::info!("Installation finished, restarting");
    Ok(())
}
