//! Settings service
//!
//! Site settings live as key/value rows in the settings table. The typed
//! [`SiteSettings`] view is cached for the public renderer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{self, Cache, CacheLayer};
use crate::db::repositories::SettingsRepository;

/// Known setting keys
pub mod keys {
    pub const SITE_NAME: &str = "site_name";
    pub const SITE_DESCRIPTION: &str = "site_description";
    pub const SITE_URL: &str = "site_url";
    pub const LOGO_URL: &str = "logo_url";
    pub const POSTS_PER_PAGE: &str = "posts_per_page";
    pub const FOOTER_TEXT: &str = "footer_text";
}

/// Site settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    #[serde(default)]
    pub site_description: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
    #[serde(default)]
    pub footer_text: String,
}

fn default_posts_per_page() -> u32 {
    10
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "NotWP".to_string(),
            site_description: "Just another NotWP site".to_string(),
            site_url: "http://localhost:8080".to_string(),
            logo_url: String::new(),
            posts_per_page: default_posts_per_page(),
            footer_text: String::new(),
        }
    }
}

impl SiteSettings {
    /// Check values before they are stored
    pub fn validate(&self) -> Result<(), SettingsServiceError> {
        if self.site_name.trim().is_empty() {
            return Err(SettingsServiceError::InvalidValue("Site name cannot be empty".to_string()));
        }
        if !(1..=100).contains(&self.posts_per_page) {
            return Err(SettingsServiceError::InvalidValue(
                "Posts per page must be between 1 and 100".to_string(),
            ));
        }
        let url = self.site_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsServiceError::InvalidValue(
                "Site URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (keys::SITE_NAME.to_string(), self.site_name.trim().to_string()),
            (keys::SITE_DESCRIPTION.to_string(), self.site_description.clone()),
            (keys::SITE_URL.to_string(), self.site_url.trim().trim_end_matches('/').to_string()),
            (keys::LOGO_URL.to_string(), self.logo_url.trim().to_string()),
            (keys::POSTS_PER_PAGE.to_string(), self.posts_per_page.to_string()),
            (keys::FOOTER_TEXT.to_string(), self.footer_text.clone()),
        ])
    }
}

/// Partial update of site settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSiteSettingsInput {
    pub site_name: Option<String>,
    pub site_description: Option<String>,
    pub site_url: Option<String>,
    pub logo_url: Option<String>,
    pub posts_per_page: Option<u32>,
    pub footer_text: Option<String>,
}

/// Settings service errors
#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    #[error("Failed to save settings: {0}")]
    SaveError(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// Settings service for managing site configuration
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    cache: Arc<Cache>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Get all site settings, cached
    pub async fn get_site_settings(&self) -> Result<SiteSettings, SettingsServiceError> {
        if let Some(settings) = self.cache.get::<SiteSettings>(cache::keys::SITE_SETTINGS).await.ok().flatten() {
            return Ok(settings);
        }

        let keys = &[
            keys::SITE_NAME,
            keys::SITE_DESCRIPTION,
            keys::SITE_URL,
            keys::LOGO_URL,
            keys::POSTS_PER_PAGE,
            keys::FOOTER_TEXT,
        ];
        let mut stored = self
            .repo
            .get_many(keys)
            .await
            .map_err(|e| SettingsServiceError::LoadError(e.to_string()))?;

        let defaults = SiteSettings::default();
        let mut take = |key: &str, default: String| stored.remove(key).unwrap_or(default);
        let settings = SiteSettings {
            site_name: take(keys::SITE_NAME, defaults.site_name),
            site_description: take(keys::SITE_DESCRIPTION, defaults.site_description),
            site_url: take(keys::SITE_URL, defaults.site_url),
            logo_url: take(keys::LOGO_URL, defaults.logo_url),
            posts_per_page: take(keys::POSTS_PER_PAGE, String::new())
                .parse()
                .unwrap_or(defaults.posts_per_page),
            footer_text: take(keys::FOOTER_TEXT, defaults.footer_text),
        };

        let _ = self.cache.set(cache::keys::SITE_SETTINGS, &settings, self.cache.default_ttl()).await;
        Ok(settings)
    }

    /// Replace all site settings
    pub async fn update_site_settings(&self, settings: &SiteSettings) -> Result<(), SettingsServiceError> {
        settings.validate()?;
        self.repo
            .set_many(&settings.to_map())
            .await
            .map_err(|e| SettingsServiceError::SaveError(e.to_string()))?;
        let _ = self.cache.delete(cache::keys::SITE_SETTINGS).await;
        Ok(())
    }

    /// Apply the given fields on top of the current settings
    pub async fn patch_site_settings(&self, input: UpdateSiteSettingsInput) -> Result<SiteSettings, SettingsServiceError> {
        let mut settings = self.get_site_settings().await?;
        if let Some(v) = input.site_name {
            settings.site_name = v;
        }
        if let Some(v) = input.site_description {
            settings.site_description = v;
        }
        if let Some(v) = input.site_url {
            settings.site_url = v;
        }
        if let Some(v) = input.logo_url {
            settings.logo_url = v;
        }
        if let Some(v) = input.posts_per_page {
            settings.posts_per_page = v;
        }
        if let Some(v) = input.footer_text {
            settings.footer_text = v;
        }
        self.update_site_settings(&settings).await?;
        self.get_site_settings().await
    }

    /// Get a single setting value
    pub async fn get(&self, key: &str) -> Result<Option<String>, SettingsServiceError> {
        let setting = self
            .repo
            .get(key)
            .await
            .map_err(|e| SettingsServiceError::LoadError(e.to_string()))?;
        Ok(setting.map(|s| s.value))
    }

    /// Set a single setting value
    pub async fn set(&self, key: &str, value: &str) -> Result<(), SettingsServiceError> {
        self.repo
            .set(key, value)
            .await
            .map_err(|e| SettingsServiceError::SaveError(e.to_string()))?;
        let _ = self.cache.delete(cache::keys::SITE_SETTINGS).await;
        Ok(())
    }

    /// Get all settings as a HashMap
    pub async fn get_all_settings(&self) -> Result<HashMap<String, String>, SettingsServiceError> {
        let settings = self
            .repo
            .get_all()
            .await
            .map_err(|e| SettingsServiceError::LoadError(e.to_string()))?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    }
}
