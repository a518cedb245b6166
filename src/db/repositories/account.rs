//! Account repository
//!
//! Database operations for administrator and editor accounts.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Account, AccountRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &Account) -> Result<Account>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Account>>;
    /// Look up an account by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn list(&self) -> Result<Vec<Account>>;
    async fn update(&self, account: &Account) -> Result<Account>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn count(&self) -> Result<i64>;
    async fn count_by_role(&self, role: AccountRole) -> Result<i64>;
}

/// SQLx-based account repository
pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &Account) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, account).await,
            DatabaseDriver::Postgres => create_postgres(self.pool.postgres()?, account).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Postgres => get_by_id_postgres(self.pool.postgres()?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = email.trim().to_lowercase();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_email_sqlite(self.pool.sqlite()?, &email).await,
            DatabaseDriver::Postgres => get_by_email_postgres(self.pool.postgres()?, &email).await,
        }
    }

    async fn list(&self) -> Result<Vec<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Postgres => list_postgres(self.pool.postgres()?).await,
        }
    }

    async fn update(&self, account: &Account) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.sqlite()?, account).await,
            DatabaseDriver::Postgres => update_postgres(self.pool.postgres()?, account).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM accounts WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete account")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM accounts WHERE id = $1")
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete account")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM accounts")
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count accounts")?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM accounts")
                .fetch_one(self.pool.postgres()?)
                .await
                .context("Failed to count accounts")?
                .get("count"),
        };
        Ok(count)
    }

    async fn count_by_role(&self, role: AccountRole) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE role = ?")
                .bind(role.to_string())
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count accounts")?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE role = $1")
                .bind(role.to_string())
                .fetch_one(self.pool.postgres()?)
                .await
                .context("Failed to count accounts")?
                .get("count"),
        };
        Ok(count)
    }
}

const COLUMNS: &str = "id, email, display_name, role, created_at, updated_at";

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO accounts (email, display_name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(account.email.to_lowercase())
    .bind(&account.display_name)
    .bind(account.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: result.last_insert_rowid(),
        email: account.email.to_lowercase(),
        display_name: account.display_name.clone(),
        role: account.role,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get account")?;
    row.map(|r| row_to_account_sqlite(&r)).transpose()
}

async fn get_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE email = ?", COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by email")?;
    row.map(|r| row_to_account_sqlite(&r)).transpose()
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!("SELECT {} FROM accounts ORDER BY id", COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list accounts")?;
    rows.iter().map(row_to_account_sqlite).collect()
}

async fn update_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    sqlx::query("UPDATE accounts SET display_name = ?, role = ?, updated_at = ? WHERE id = ?")
        .bind(&account.display_name)
        .bind(account.role.to_string())
        .bind(Utc::now())
        .bind(account.id)
        .execute(pool)
        .await
        .context("Failed to update account")?;
    get_by_id_sqlite(pool, account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    let role: String = row.get("role");
    Ok(Account {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: role.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// Postgres implementations
async fn create_postgres(pool: &PgPool, account: &Account) -> Result<Account> {
    let now = Utc::now();
    let row = sqlx::query(
        "INSERT INTO accounts (email, display_name, role, created_at, updated_at) VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(account.email.to_lowercase())
    .bind(&account.display_name)
    .bind(account.role.to_string())
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: row.get("id"),
        email: account.email.to_lowercase(),
        display_name: account.display_name.clone(),
        role: account.role,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_postgres(pool: &PgPool, id: i64) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = $1", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get account")?;
    row.map(|r| row_to_account_postgres(&r)).transpose()
}

async fn get_by_email_postgres(pool: &PgPool, email: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE email = $1", COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get account by email")?;
    row.map(|r| row_to_account_postgres(&r)).transpose()
}

async fn list_postgres(pool: &PgPool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!("SELECT {} FROM accounts ORDER BY id", COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list accounts")?;
    rows.iter().map(row_to_account_postgres).collect()
}

async fn update_postgres(pool: &PgPool, account: &Account) -> Result<Account> {
    sqlx::query("UPDATE accounts SET display_name = $1, role = $2, updated_at = $3 WHERE id = $4")
        .bind(&account.display_name)
        .bind(account.role.to_string())
        .bind(Utc::now())
        .bind(account.id)
        .execute(pool)
        .await
        .context("Failed to update account")?;
    get_by_id_postgres(pool, account.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

fn row_to_account_postgres(row: &sqlx::postgres::PgRow) -> Result<Account> {
    let role: String = row.get("role");
    Ok(Account {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: role.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxAccountRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAccountRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_email() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&Account::new("Ada@Example.com".into(), "Ada".into(), AccountRole::Admin))
            .await
            .expect("Failed to create account");

        assert!(created.id > 0);
        assert_eq!(created.email, "ada@example.com");

        let found = repo
            .get_by_email("  ADA@example.COM ")
            .await
            .unwrap()
            .expect("Account not found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, AccountRole::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&Account::new("a@example.com".into(), "A".into(), AccountRole::Editor))
            .await
            .unwrap();
        let result = repo
            .create(&Account::new("A@example.com".into(), "B".into(), AccountRole::Editor))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_and_counts() {
        let repo = setup_test_repo().await;
        let mut account = repo
            .create(&Account::new("e@example.com".into(), "E".into(), AccountRole::Editor))
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.count_by_role(AccountRole::Admin).await.unwrap(), 0);

        account.role = AccountRole::Admin;
        account.display_name = "Editor in chief".into();
        let updated = repo.update(&account).await.unwrap();
        assert_eq!(updated.display_name, "Editor in chief");
        assert_eq!(repo.count_by_role(AccountRole::Admin).await.unwrap(), 1);

        repo.delete(account.id).await.unwrap();
        assert!(repo.get_by_id(account.id).await.unwrap().is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
