//! Common API utilities and shared types

use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::{ContentStatus, ListParams};

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for admin lists
pub fn default_per_page() -> u32 {
    20
}

/// `?page=&per_page=` query
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    /// Falls back to the `posts_per_page` setting on public lists
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl PaginationQuery {
    pub fn params(&self, fallback_per_page: u32) -> ListParams {
        ListParams::new(self.page, self.per_page.unwrap_or(fallback_per_page))
    }
}

/// Admin list query with an optional status filter
#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub status: Option<String>,
}

impl AdminListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }

    pub fn status(&self) -> Result<Option<ContentStatus>, ApiError> {
        match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("all") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(|_| ApiError::validation_error(format!("Invalid status: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_status_filter() {
        let q = |status: Option<&str>| AdminListQuery {
            page: 1,
            per_page: 20,
            status: status.map(str::to_string),
        };
        assert_eq!(q(None).status().unwrap(), None);
        assert_eq!(q(Some("all")).status().unwrap(), None);
        assert_eq!(q(Some("Published")).status().unwrap(), Some(ContentStatus::Published));
        assert!(q(Some("archived")).status().is_err());
    }

    #[test]
    fn test_pagination_clamps() {
        let q = PaginationQuery { page: 0, per_page: Some(1000) };
        let params = q.params(10);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        let q = PaginationQuery { page: 3, per_page: None };
        assert_eq!(q.params(7).per_page, 7);
    }
}
