//! Database migrations
//!
//! Migrations are plain SQL files under `migrations/<driver>/`, embedded into
//! the binary at build time. Files are named `NNNN_description.sql` and run in
//! ascending order of their numeric prefix.
//!
//! Each file is applied inside its own transaction, one statement at a time.
//! The first failing statement aborts the run: the failing file is rolled
//! back, files after it are not attempted, and the error reports what had
//! already been applied. Applied versions are recorded in `_migrations`, so a
//! rerun picks up where the previous one stopped.
//!
//! # Usage
//!
//! ```ignore
//! use notwp::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! let report = migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde::Serialize;
use sqlx::{PgPool, Row, SqlitePool};
use std::collections::HashSet;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// Embedded migration files
#[derive(RustEmbed)]
#[folder = "migrations/"]
#[include = "*.sql"]
struct MigrationFiles;

/// A single migration file
#[derive(Debug, Clone)]
pub struct Migration {
    /// Numeric prefix of the file name
    pub version: i64,
    /// File name without the directory, e.g. `0001_accounts.sql`
    pub name: String,
    /// Raw SQL contents
    pub sql: String,
}

/// Summary of a successful migration run
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Files applied during this run, in order
    pub applied: Vec<String>,
    /// Files that had been applied by an earlier run
    pub already_applied: usize,
}

/// The first failure of a migration run
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("Migration {name} failed: {message}")]
pub struct MigrationError {
    /// Version of the failing file, 0 when bookkeeping itself failed
    pub version: i64,
    /// Failing file name, or `_migrations` for bookkeeping failures
    pub name: String,
    /// Abbreviated statement that failed, if any
    pub statement: Option<String>,
    /// Underlying database error
    pub message: String,
    /// Files applied during this run before the failure
    pub applied: Vec<String>,
}

impl MigrationError {
    fn bookkeeping(err: anyhow::Error) -> Self {
        Self {
            version: 0,
            name: "_migrations".to_string(),
            statement: None,
            message: format!("{:#}", err),
            applied: Vec::new(),
        }
    }
}

/// List the migrations for a driver, sorted by version.
pub fn list_migrations(driver: DatabaseDriver) -> Vec<Migration> {
    let prefix = format!("{}/", driver.as_str());
    let mut migrations: Vec<Migration> = MigrationFiles::iter()
        .filter(|path| path.starts_with(&prefix))
        .filter_map(|path| {
            let name = path.trim_start_matches(&prefix).to_string();
            let version = parse_version(&name)?;
            let file = MigrationFiles::get(&path)?;
            let sql = String::from_utf8_lossy(&file.data).into_owned();
            Some(Migration { version, name, sql })
        })
        .collect();

    migrations.sort_by_key(|m| m.version);
    migrations
}

/// Extract the numeric prefix of `NNNN_name.sql`
fn parse_version(name: &str) -> Option<i64> {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !name.ends_with(".sql") {
        return None;
    }
    digits.parse().ok()
}

/// Run all pending migrations, stopping at the first failure.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<MigrationReport, MigrationError> {
    create_migrations_table(pool)
        .await
        .map_err(MigrationError::bookkeeping)?;

    let applied_versions = applied_versions(pool)
        .await
        .map_err(MigrationError::bookkeeping)?;

    let mut report = MigrationReport::default();

    for migration in list_migrations(pool.driver()) {
        if applied_versions.contains(&migration.version) {
            report.already_applied += 1;
            continue;
        }

        tracing::info!("Applying migration {}", migration.name);

        if let Err(mut err) = apply_migration(pool, &migration).await {
            tracing::error!("Migration {} failed: {}", migration.name, err.message);
            err.applied = report.applied;
            return Err(err);
        }

        report.applied.push(migration.name);
    }

    if report.applied.is_empty() {
        tracing::debug!("No pending migrations");
    } else {
        tracing::info!("Applied {} migration(s)", report.applied.len());
    }

    Ok(report)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Postgres => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Versions already recorded in `_migrations`
async fn applied_versions(pool: &DynDatabasePool) -> Result<HashSet<i64>> {
    let versions = match pool.driver() {
        DatabaseDriver::Sqlite => applied_versions_sqlite(pool.sqlite()?).await?,
        DatabaseDriver::Postgres => applied_versions_postgres(pool.postgres()?).await?,
    };
    Ok(versions.into_iter().collect())
}

async fn applied_versions_sqlite(pool: &SqlitePool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;
    Ok(rows.iter().map(|row| row.get("version")).collect())
}

async fn applied_versions_postgres(pool: &PgPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;
    Ok(rows.iter().map(|row| row.get("version")).collect())
}

/// Apply a single migration inside a transaction
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<(), MigrationError> {
    let fail = |statement: Option<&str>, err: sqlx::Error| MigrationError {
        version: migration.version,
        name: migration.name.clone(),
        statement: statement.map(truncate_sql),
        message: err.to_string(),
        applied: Vec::new(),
    };

    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let sqlite = pool.sqlite().map_err(MigrationError::bookkeeping)?;
            let mut tx = sqlite.begin().await.map_err(|e| fail(None, e))?;
            for statement in split_sql_statements(&migration.sql) {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| fail(Some(statement), e))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(&migration.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| fail(None, e))?;
            tx.commit().await.map_err(|e| fail(None, e))?;
        }
        DatabaseDriver::Postgres => {
            let pg = pool.postgres().map_err(MigrationError::bookkeeping)?;
            let mut tx = pg.begin().await.map_err(|e| fail(None, e))?;
            for statement in split_sql_statements(&migration.sql) {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| fail(Some(statement), e))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(&migration.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| fail(None, e))?;
            tx.commit().await.map_err(|e| fail(None, e))?;
        }
    }

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.chars().count() > 100 {
        let head: String = sql.chars().take(100).collect();
        format!("{}...", head)
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements.
///
/// Semicolons inside single-quoted strings and `--` line comments do not
/// terminate a statement. Statements consisting only of comments are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if c == '\'' {
                // '' is an escaped quote inside a string
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '-' if matches!(chars.peek(), Some((_, '-'))) => in_comment = true,
            ';' => {
                push_statement(&mut statements, &sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    push_statement(&mut statements, &sql[start..]);
    statements
}

fn push_statement<'a>(statements: &mut Vec<&'a str>, candidate: &'a str) {
    let stmt = candidate.trim();
    if !stmt.is_empty() && !is_comment_only(stmt) {
        statements.push(stmt);
    }
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with("--")
    })
}

/// Migrations that have not been applied yet
pub async fn pending(pool: &DynDatabasePool) -> Result<Vec<Migration>> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;
    Ok(list_migrations(pool.driver())
        .into_iter()
        .filter(|m| !applied.contains(&m.version))
        .collect())
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending(pool).await?.is_empty())
}
