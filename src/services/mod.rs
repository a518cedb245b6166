//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - validate input and enforce business rules
//! - render Markdown and page blocks into stored HTML
//! - keep the public read cache in sync with writes

pub mod accounts;
pub mod auth;
pub mod blocks;
pub mod content;
pub mod doc;
pub mod install;
pub mod mailer;
pub mod markdown;
pub mod media;
pub mod nav_item;
pub mod newsletter;
pub mod page;
pub mod post;
pub mod rate_limiter;
pub mod settings;
pub mod slug;

pub use accounts::{is_valid_email, AccountService, AccountServiceError};
pub use auth::{AuthError, AuthService, CleanupReport};
pub use content::ContentError;
pub use doc::DocService;
pub use install::{InstallError, InstallStatus, InstallStep, InstallWizard};
pub use mailer::{mailer_from_config, LogMailer, Mailer, OutgoingMail, SmtpMailer};
pub use markdown::MarkdownRenderer;
pub use media::{MediaError, MediaFile, MediaService};
pub use nav_item::{NavItemError, NavItemService};
pub use newsletter::{NewsletterError, NewsletterService};
pub use page::PageService;
pub use post::PostService;
pub use rate_limiter::LoginRateLimiter;
pub use settings::{SettingsService, SettingsServiceError, SiteSettings, UpdateSiteSettingsInput};
