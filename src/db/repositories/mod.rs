//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity and
//! dispatches on the pool's driver to SQLite or Postgres queries.

pub mod account;
pub mod doc;
pub mod login_code;
pub mod nav_item;
pub mod newsletter_email;
pub mod page;
pub mod post;
pub mod session;
pub mod settings;
pub mod subscriber;

pub use account::{AccountRepository, SqlxAccountRepository};
pub use doc::{DocRepository, SqlxDocRepository};
pub use login_code::{LoginCodeRepository, SqlxLoginCodeRepository};
pub use nav_item::{NavItemRepository, SqlxNavItemRepository};
pub use newsletter_email::{NewsletterEmailRepository, SqlxNewsletterEmailRepository};
pub use page::{PageRepository, SqlxPageRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use subscriber::{SqlxSubscriberRepository, SubscriberRepository};
