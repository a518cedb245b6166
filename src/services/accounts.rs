//! Account management
//!
//! Administrators invite editors and other administrators by email. The
//! last administrator can never be removed or demoted, and nobody can
//! delete their own account.

use crate::db::repositories::AccountRepository;
use crate::models::{Account, AccountRole, CreateAccountInput, UpdateAccountInput};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email regex is valid")
});

/// Basic email format check (local part, `@`, dotted domain)
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Account not found")]
    NotFound,

    #[error("An account with email '{0}' already exists")]
    EmailTaken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Account>, AccountServiceError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Account, AccountServiceError> {
        self.repo.get_by_id(id).await?.ok_or(AccountServiceError::NotFound)
    }

    pub async fn has_accounts(&self) -> Result<bool, AccountServiceError> {
        Ok(self.repo.count().await? > 0)
    }

    pub async fn create(&self, input: CreateAccountInput) -> Result<Account, AccountServiceError> {
        let email = input.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AccountServiceError::ValidationError(format!("Invalid email address: {}", input.email)));
        }
        let role = parse_role(input.role.as_deref())?.unwrap_or_default();

        if self.repo.get_by_email(&email).await?.is_some() {
            return Err(AccountServiceError::EmailTaken(email));
        }

        let display_name = match input.display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let account = self.repo.create(&Account::new(email, display_name, role)).await?;
        tracing::info!("Created {} account {}", account.role, account.email);
        Ok(account)
    }

    /// Update display name and role. Demoting the last administrator is refused.
    pub async fn update(&self, id: i64, input: UpdateAccountInput) -> Result<Account, AccountServiceError> {
        let mut account = self.get(id).await?;

        if let Some(name) = input.display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AccountServiceError::ValidationError("Display name cannot be empty".to_string()));
            }
            account.display_name = name.to_string();
        }

        if let Some(role) = parse_role(input.role.as_deref())? {
            if account.is_admin() && role != AccountRole::Admin && self.repo.count_by_role(AccountRole::Admin).await? <= 1 {
                return Err(AccountServiceError::Forbidden("Cannot demote the last administrator".to_string()));
            }
            account.role = role;
        }

        Ok(self.repo.update(&account).await?)
    }

    /// Delete an account on behalf of `acting_id`
    pub async fn delete(&self, id: i64, acting_id: i64) -> Result<(), AccountServiceError> {
        if id == acting_id {
            return Err(AccountServiceError::Forbidden("You cannot delete your own account".to_string()));
        }
        let account = self.get(id).await?;
        if account.is_admin() && self.repo.count_by_role(AccountRole::Admin).await? <= 1 {
            return Err(AccountServiceError::Forbidden("Cannot delete the last administrator".to_string()));
        }

        self.repo.delete(id).await?;
        tracing::info!("Deleted account {}", account.email);
        Ok(())
    }
}

fn parse_role(role: Option<&str>) -> Result<Option<AccountRole>, AccountServiceError> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) => role
            .parse()
            .map(Some)
            .map_err(|_| AccountServiceError::ValidationError(format!("Invalid role: {}", role))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxAccountRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_service() -> AccountService {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        AccountService::new(SqlxAccountRepository::boxed(pool))
    }

    fn input(email: &str, role: Option<&str>) -> CreateAccountInput {
        CreateAccountInput {
            email: email.to_string(),
            display_name: String::new(),
            role: role.map(String::from),
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co.uk"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let service = setup_service().await;
        assert!(!service.has_accounts().await.unwrap());

        let account = service.create(input(" Writer@Example.com ", None)).await.unwrap();
        assert_eq!(account.email, "writer@example.com");
        assert_eq!(account.display_name, "writer");
        assert_eq!(account.role, AccountRole::Editor);
        assert!(service.has_accounts().await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_input() {
        let service = setup_service().await;
        service.create(input("a@example.com", None)).await.unwrap();

        let dup = service.create(input("A@EXAMPLE.COM", None)).await;
        assert!(matches!(dup, Err(AccountServiceError::EmailTaken(_))));

        let bad_role = service.create(input("b@example.com", Some("owner"))).await;
        assert!(matches!(bad_role, Err(AccountServiceError::ValidationError(_))));

        let bad_email = service.create(input("nope", None)).await;
        assert!(matches!(bad_email, Err(AccountServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_last_admin_protected() {
        let service = setup_service().await;
        let admin = service.create(input("admin@example.com", Some("admin"))).await.unwrap();
        let editor = service.create(input("editor@example.com", None)).await.unwrap();

        let demote = service
            .update(admin.id, UpdateAccountInput { role: Some("editor".into()), ..Default::default() })
            .await;
        assert!(matches!(demote, Err(AccountServiceError::Forbidden(_))));

        let delete = service.delete(admin.id, editor.id).await;
        assert!(matches!(delete, Err(AccountServiceError::Forbidden(_))));

        // With a second admin, the first one can go
        service
            .update(editor.id, UpdateAccountInput { role: Some("admin".into()), ..Default::default() })
            .await
            .unwrap();
        service.delete(admin.id, editor.id).await.unwrap();
        assert!(matches!(service.get(admin.id).await, Err(AccountServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let service = setup_service().await;
        let admin = service.create(input("admin@example.com", Some("admin"))).await.unwrap();
        service.create(input("other@example.com", Some("admin"))).await.unwrap();

        let result = service.delete(admin.id, admin.id).await;
        assert!(matches!(result, Err(AccountServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_display_name() {
        let service = setup_service().await;
        let account = service.create(input("a@example.com", None)).await.unwrap();

        let updated = service
            .update(account.id, UpdateAccountInput { display_name: Some("  Ada  ".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Ada");

        let empty = service
            .update(account.id, UpdateAccountInput { display_name: Some(" ".into()), ..Default::default() })
            .await;
        assert!(matches!(empty, Err(AccountServiceError::ValidationError(_))));
    }

    proptest! {
        #[test]
        fn prop_emails_without_at_are_invalid(s in "[a-z0-9.]{0,30}") {
            prop_assert!(!is_valid_email(&s));
        }
    }
}
