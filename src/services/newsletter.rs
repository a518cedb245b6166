//! Newsletter service
//!
//! Manages subscribers (public sign-up, unsubscribe links, CSV import and
//! export) and newsletter emails, which are drafted in Markdown and sent
//! once to every subscribed address.

use crate::db::repositories::{NewsletterEmailRepository, SettingsRepository, SubscriberRepository};
use crate::models::{
    CreateNewsletterEmailInput, ImportReport, NewsletterEmail, NewsletterEmailStatus, NewsletterSettings, SendReport,
    SubscribeInput, Subscriber, SubscriberStatus, UpdateNewsletterEmailInput,
};
use crate::services::accounts::is_valid_email;
use crate::services::mailer::{Mailer, OutgoingMail};
use crate::services::markdown::{html_escape, MarkdownRenderer};
use crate::services::settings::keys as site_keys;
use anyhow::Context;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Setting keys for newsletter sender details
pub mod keys {
    pub const FROM_NAME: &str = "newsletter_from_name";
    pub const REPLY_TO: &str = "newsletter_reply_to";
    pub const FOOTER: &str = "newsletter_footer";
}

#[derive(Debug, thiserror::Error)]
pub enum NewsletterError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<csv::Error> for NewsletterError {
    fn from(e: csv::Error) -> Self {
        NewsletterError::ValidationError(format!("Invalid CSV: {}", e))
    }
}

pub struct NewsletterService {
    subscribers: Arc<dyn SubscriberRepository>,
    emails: Arc<dyn NewsletterEmailRepository>,
    settings: Arc<dyn SettingsRepository>,
    mailer: Arc<dyn Mailer>,
    markdown: Arc<MarkdownRenderer>,
    /// Fallback base URL for unsubscribe links when `site_url` is unset
    public_url: String,
    /// Serializes sends so an email cannot go out twice
    send_lock: Mutex<()>,
}

impl NewsletterService {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        emails: Arc<dyn NewsletterEmailRepository>,
        settings: Arc<dyn SettingsRepository>,
        mailer: Arc<dyn Mailer>,
        markdown: Arc<MarkdownRenderer>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            subscribers,
            emails,
            settings,
            mailer,
            markdown,
            public_url: public_url.into(),
            send_lock: Mutex::new(()),
        }
    }

    // ===== Subscribers =====

    /// Subscribe an address. Already subscribed addresses are returned as-is;
    /// unsubscribed ones are re-activated.
    pub async fn subscribe(&self, input: SubscribeInput) -> Result<Subscriber, NewsletterError> {
        let email = input.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(NewsletterError::ValidationError("A valid email address is required".to_string()));
        }
        let name = input.name.trim().to_string();

        if let Some(mut existing) = self.subscribers.get_by_email(&email).await? {
            if existing.status == SubscriberStatus::Subscribed {
                return Ok(existing);
            }
            existing.status = SubscriberStatus::Subscribed;
            existing.unsubscribed_at = None;
            if !name.is_empty() {
                existing.name = name;
            }
            tracing::info!("Re-subscribed {}", email);
            return Ok(self.subscribers.update(&existing).await?);
        }

        let subscriber = self.subscribers.create(&new_subscriber(email, name)).await?;
        tracing::info!("New subscriber {}", subscriber.email);
        Ok(subscriber)
    }

    /// Unsubscribe the owner of an unsubscribe token
    pub async fn unsubscribe(&self, token: &str) -> Result<Subscriber, NewsletterError> {
        let mut subscriber = self
            .subscribers
            .get_by_token(token.trim())
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Subscription".to_string()))?;

        if subscriber.status == SubscriberStatus::Unsubscribed {
            return Ok(subscriber);
        }
        subscriber.status = SubscriberStatus::Unsubscribed;
        subscriber.unsubscribed_at = Some(Utc::now());
        tracing::info!("Unsubscribed {}", subscriber.email);
        Ok(self.subscribers.update(&subscriber).await?)
    }

    pub async fn list_subscribers(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>, NewsletterError> {
        Ok(self.subscribers.list(status).await?)
    }

    pub async fn count_subscribers(&self, status: Option<SubscriberStatus>) -> Result<i64, NewsletterError> {
        Ok(self.subscribers.count(status).await?)
    }

    pub async fn delete_subscriber(&self, id: i64) -> Result<(), NewsletterError> {
        if !self.subscribers.delete(id).await? {
            return Err(NewsletterError::NotFound(format!("Subscriber {}", id)));
        }
        Ok(())
    }

    /// Import subscribers from CSV with an `email` column and an optional
    /// `name` column. Invalid rows are reported, duplicates and addresses
    /// already on file (including unsubscribed ones) are skipped.
    pub async fn import_csv(&self, data: &[u8]) -> Result<ImportReport, NewsletterError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name));
        let email_col = column("email")
            .ok_or_else(|| NewsletterError::ValidationError("CSV must have an 'email' column".to_string()))?;
        let name_col = column("name");

        let mut report = ImportReport::default();
        let mut seen = HashSet::new();

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    report.skipped += 1;
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let email = record.get(email_col).unwrap_or_default().to_lowercase();
            if !is_valid_email(&email) {
                report.skipped += 1;
                report.errors.push(format!("Line {}: invalid email '{}'", line, email));
                continue;
            }
            if !seen.insert(email.clone()) || self.subscribers.get_by_email(&email).await?.is_some() {
                report.skipped += 1;
                continue;
            }

            let name = name_col.and_then(|i| record.get(i)).unwrap_or_default().to_string();
            self.subscribers.create(&new_subscriber(email, name)).await?;
            report.imported += 1;
        }

        tracing::info!(
            "Imported {} subscribers ({} skipped, {} errors)",
            report.imported,
            report.skipped,
            report.errors.len()
        );
        Ok(report)
    }

    /// All subscribers as CSV
    pub async fn export_csv(&self) -> Result<String, NewsletterError> {
        let subscribers = self.subscribers.list(None).await?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["email", "name", "status", "created_at", "unsubscribed_at"])?;
        for s in &subscribers {
            let status = s.status.to_string();
            let created_at = s.created_at.to_rfc3339();
            let unsubscribed_at = s.unsubscribed_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            writer.write_record([&s.email, &s.name, &status, &created_at, &unsubscribed_at])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish CSV: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output is not UTF-8").map_err(Into::into)
    }

    // ===== Emails =====

    pub async fn create_email(&self, input: CreateNewsletterEmailInput) -> Result<NewsletterEmail, NewsletterError> {
        let subject = require_subject(&input.subject)?;
        let now = Utc::now();
        let email = NewsletterEmail {
            id: 0,
            subject,
            content_html: self.markdown.render(&input.content),
            content: input.content,
            status: NewsletterEmailStatus::Draft,
            recipient_count: 0,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        Ok(self.emails.create(&email).await?)
    }

    pub async fn get_email(&self, id: i64) -> Result<NewsletterEmail, NewsletterError> {
        self.emails
            .get_by_id(id)
            .await?
            .ok_or_else(|| NewsletterError::NotFound(format!("Newsletter email {}", id)))
    }

    pub async fn list_emails(&self) -> Result<Vec<NewsletterEmail>, NewsletterError> {
        Ok(self.emails.list().await?)
    }

    /// Edit a draft; sent emails are immutable
    pub async fn update_email(&self, id: i64, input: UpdateNewsletterEmailInput) -> Result<NewsletterEmail, NewsletterError> {
        let mut email = self.get_email(id).await?;
        if email.status == NewsletterEmailStatus::Sent {
            return Err(NewsletterError::Conflict("Sent emails cannot be edited".to_string()));
        }
        if let Some(subject) = input.subject {
            email.subject = require_subject(&subject)?;
        }
        if let Some(content) = input.content {
            email.content_html = self.markdown.render(&content);
            email.content = content;
        }
        Ok(self.emails.update(&email).await?)
    }

    pub async fn delete_email(&self, id: i64) -> Result<(), NewsletterError> {
        if !self.emails.delete(id).await? {
            return Err(NewsletterError::NotFound(format!("Newsletter email {}", id)));
        }
        Ok(())
    }

    /// Send a draft to every subscribed address.
    ///
    /// Failed deliveries are logged and counted; the email is marked sent with
    /// the number of successful deliveries.
    pub async fn send(&self, id: i64) -> Result<SendReport, NewsletterError> {
        let _guard = self.send_lock.lock().await;

        let email = self.get_email(id).await?;
        if email.status == NewsletterEmailStatus::Sent {
            return Err(NewsletterError::Conflict("This email has already been sent".to_string()));
        }

        let recipients = self.subscribers.list(Some(SubscriberStatus::Subscribed)).await?;
        if recipients.is_empty() {
            return Err(NewsletterError::ValidationError("There are no subscribers to send to".to_string()));
        }

        let settings = self.get_settings().await?;
        let base_url = self.base_url().await?;

        let mut delivered = 0usize;
        let mut failed = 0usize;
        for subscriber in &recipients {
            let mail = compose(&email, &settings, &unsubscribe_url(&base_url, &subscriber.token), &subscriber.email);
            match self.mailer.send(&mail).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Failed to deliver newsletter {} to {}: {}", email.id, subscriber.email, e);
                }
            }
        }

        let email = self.emails.mark_sent(id, delivered as i32, Utc::now()).await?;
        tracing::info!("Newsletter {} sent: {} delivered, {} failed", email.id, delivered, failed);
        Ok(SendReport { email, delivered, failed })
    }

    // ===== Settings =====

    pub async fn get_settings(&self) -> Result<NewsletterSettings, NewsletterError> {
        let mut values = self.settings.get_many(&[keys::FROM_NAME, keys::REPLY_TO, keys::FOOTER]).await?;
        Ok(NewsletterSettings {
            from_name: values.remove(keys::FROM_NAME).unwrap_or_default(),
            reply_to: values.remove(keys::REPLY_TO).unwrap_or_default(),
            footer: values.remove(keys::FOOTER).unwrap_or_default(),
        })
    }

    pub async fn update_settings(&self, settings: NewsletterSettings) -> Result<NewsletterSettings, NewsletterError> {
        let reply_to = settings.reply_to.trim().to_lowercase();
        if !reply_to.is_empty() && !is_valid_email(&reply_to) {
            return Err(NewsletterError::ValidationError("Reply-to must be a valid email address".to_string()));
        }
        let values = HashMap::from([
            (keys::FROM_NAME.to_string(), settings.from_name.trim().to_string()),
            (keys::REPLY_TO.to_string(), reply_to),
            (keys::FOOTER.to_string(), settings.footer),
        ]);
        self.settings.set_many(&values).await?;
        self.get_settings().await
    }

    async fn base_url(&self) -> Result<String, NewsletterError> {
        let site_url = self.settings.get(site_keys::SITE_URL).await?.map(|s| s.value).unwrap_or_default();
        let base = if site_url.trim().is_empty() { &self.public_url } else { &site_url };
        Ok(base.trim().trim_end_matches('/').to_string())
    }
}

fn new_subscriber(email: String, name: String) -> Subscriber {
    Subscriber {
        id: 0,
        email,
        name,
        status: SubscriberStatus::Subscribed,
        token: Uuid::new_v4().simple().to_string(),
        created_at: Utc::now(),
        unsubscribed_at: None,
    }
}

fn require_subject(subject: &str) -> Result<String, NewsletterError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(NewsletterError::ValidationError("Subject cannot be empty".to_string()));
    }
    Ok(subject.to_string())
}

fn unsubscribe_url(base_url: &str, token: &str) -> String {
    format!("{}/newsletter/unsubscribe?token={}", base_url, urlencoding::encode(token))
}

/// Build one recipient's copy with footer and unsubscribe link appended
fn compose(email: &NewsletterEmail, settings: &NewsletterSettings, unsubscribe: &str, to: &str) -> OutgoingMail {
    let mut text = email.content.clone();
    text.push_str("\n\n--\n");
    if !settings.footer.is_empty() {
        text.push_str(&settings.footer);
        text.push('\n');
    }
    text.push_str(&format!("Unsubscribe: {}\n", unsubscribe));

    let mut html = email.content_html.clone();
    html.push_str("<hr><footer style=\"font-size:small;color:#666\">");
    if !settings.footer.is_empty() {
        html.push_str(&format!("<p>{}</p>", html_escape(&settings.footer)));
    }
    html.push_str(&format!("<p><a href=\"{}\">Unsubscribe</a></p></footer>", html_escape(unsubscribe)));

    OutgoingMail {
        to: to.to_string(),
        subject: email.subject.clone(),
        text,
        html: Some(html),
        from_name: Some(settings.from_name.clone()).filter(|n| !n.is_empty()),
        reply_to: Some(settings.reply_to.clone()).filter(|r| !r.is_empty()),
    }
}
