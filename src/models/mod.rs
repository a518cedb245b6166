//! Data models
//!
//! This module contains the data structures used throughout NotWP:
//! - Database entities (Account, Session, Post, Page, Doc, NavItem, Subscriber, NewsletterEmail)
//! - API request types (`Create*Input`, `Update*Input`)
//! - Pagination helpers

mod account;
mod content;
mod doc;
mod nav_item;
mod newsletter;
mod page;
mod post;
mod session;

pub use account::{Account, AccountRole, CreateAccountInput, UpdateAccountInput};
pub use content::{ContentStatus, ListParams, PagedResult};
pub use doc::{CreateDocInput, Doc, DocSection, DocSummary, TocEntry, UpdateDocInput};
pub use nav_item::{CreateNavItemInput, NavItem, NavItemTree, NavOrderItem, UpdateNavItemInput, UpdateNavOrderInput};
pub use newsletter::{
    CreateNewsletterEmailInput, ImportReport, NewsletterEmail, NewsletterEmailStatus, NewsletterSettings, SendReport,
    SubscribeInput, Subscriber, SubscriberStatus, UpdateNewsletterEmailInput,
};
pub use page::{Block, CreatePageInput, Page, UpdatePageInput};
pub use post::{CreatePostInput, Post, UpdatePostInput};
pub use session::{LoginCode, Session};

use serde::{Deserialize, Deserializer};

/// Deserialize a present field (including `null`) as `Some`, so that
/// `Option<Option<T>>` can tell "missing" apart from "set to null".
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
