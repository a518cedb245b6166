//! Database layer
//!
//! Supports two drivers behind one pool abstraction:
//! - SQLite (default, single-file deployment)
//! - PostgreSQL
//!
//! # Usage
//!
//! ```ignore
//! use notwp::config::DatabaseConfig;
//! use notwp::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, PostgresDatabase, SqliteDatabase};
