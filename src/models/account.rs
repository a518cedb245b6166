//! Account model
//!
//! Accounts sign in with a one-time code sent to their email address, so
//! there is no password material stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An administrator or editor of the site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Email address (unique, stored lowercase)
    pub email: String,
    pub display_name: String,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, display_name: String, role: AccountRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            display_name,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

/// Account role
///
/// Editors manage content; administrators additionally manage accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Admin,
    #[default]
    Editor,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Admin => write!(f, "admin"),
            AccountRole::Editor => write!(f, "editor"),
        }
    }
}

impl FromStr for AccountRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(AccountRole::Admin),
            "editor" => Ok(AccountRole::Editor),
            _ => Err(anyhow::anyhow!("Invalid account role: {}", s)),
        }
    }
}

/// Input for creating an account
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountInput {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Input for updating an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccountInput {
    pub display_name: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_strings() {
        assert_eq!("admin".parse::<AccountRole>().unwrap(), AccountRole::Admin);
        assert_eq!("EDITOR".parse::<AccountRole>().unwrap(), AccountRole::Editor);
        assert!("author".parse::<AccountRole>().is_err());
        assert_eq!(AccountRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new("a@example.com".into(), "A".into(), AccountRole::Editor);
        assert_eq!(account.id, 0);
        assert!(!account.is_admin());
    }
}
