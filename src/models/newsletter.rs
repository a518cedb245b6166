//! Newsletter models: subscribers and outgoing newsletter emails

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscriber status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    #[default]
    Subscribed,
    Unsubscribed,
}

impl std::fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribed => write!(f, "subscribed"),
            Self::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

impl std::str::FromStr for SubscriberStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subscribed" => Ok(Self::Subscribed),
            "unsubscribed" => Ok(Self::Unsubscribed),
            _ => Err(anyhow::anyhow!("Invalid subscriber status: {}", s)),
        }
    }
}

/// A newsletter subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub status: SubscriberStatus,
    /// Opaque token used in unsubscribe links
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Newsletter email status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NewsletterEmailStatus {
    #[default]
    Draft,
    Sent,
}

impl std::fmt::Display for NewsletterEmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Sent => write!(f, "sent"),
        }
    }
}

impl std::str::FromStr for NewsletterEmailStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            _ => Err(anyhow::anyhow!("Invalid newsletter email status: {}", s)),
        }
    }
}

/// A newsletter issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterEmail {
    pub id: i64,
    pub subject: String,
    /// Markdown source
    pub content: String,
    pub content_html: String,
    pub status: NewsletterEmailStatus,
    /// Number of subscribers the email was delivered to
    pub recipient_count: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public subscription request
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeInput {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Input for creating a newsletter email
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNewsletterEmailInput {
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

/// Input for updating a draft newsletter email
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNewsletterEmailInput {
    pub subject: Option<String>,
    pub content: Option<String>,
}

/// Sender details and footer used for every newsletter email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewsletterSettings {
    pub from_name: String,
    pub reply_to: String,
    pub footer: String,
}

/// Outcome of a CSV subscriber import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// One message per rejected row
    pub errors: Vec<String>,
}

/// Outcome of sending a newsletter email
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub email: NewsletterEmail,
    pub delivered: usize,
    pub failed: usize,
}
