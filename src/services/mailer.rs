//! Outgoing mail
//!
//! Login codes and newsletter issues go through the [`Mailer`] trait.
//! [`SmtpMailer`] delivers over SMTP with lettre; [`LogMailer`] only logs,
//! which is the default until SMTP is configured.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};

use crate::config::{MailConfig, MailTransport};

/// A message ready to be sent
#[derive(Debug, Clone, Default)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// Optional HTML alternative
    pub html: Option<String>,
    /// Overrides the display name of the configured sender
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid from address '{}': {}", config.from, e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message> {
        let from = match mail.from_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => Mailbox::new(Some(name.to_string()), self.from.email.clone()),
            None => self.from.clone(),
        };

        let mut builder = Message::builder()
            .from(from)
            .to(mail.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject.clone());

        if let Some(reply_to) = mail.reply_to.as_deref().filter(|r| !r.is_empty()) {
            builder = builder.reply_to(reply_to.parse().map_err(|e| anyhow!("Invalid reply-to address: {}", e))?);
        }

        let message = match &mail.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(mail.text.clone(), html.clone())),
            None => builder.header(ContentType::TEXT_PLAIN).body(mail.text.clone()),
        };
        message.map_err(|e| anyhow!("Failed to build email: {}", e))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = self.build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email to {}: {}", mail.to, e))?;
        tracing::debug!("Sent email '{}' to {}", mail.subject, mail.to);
        Ok(())
    }
}

/// Logs messages instead of delivering them.
///
/// The most recent messages are kept in memory so they can be inspected.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

const LOG_MAILER_HISTORY: usize = 100;

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far, oldest first
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail transport is 'log'; not delivering:\n{}", mail.text);
        if let Ok(mut sent) = self.sent.lock() {
            if sent.len() >= LOG_MAILER_HISTORY {
                sent.remove(0);
            }
            sent.push(mail.clone());
        }
        Ok(())
    }
}

/// Build the mailer selected by the configuration
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        MailTransport::Log => {
            tracing::warn!("Mail transport is 'log'; emails will be written to the log instead of sent");
            Ok(Arc::new(LogMailer::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> MailConfig {
        MailConfig {
            transport: MailTransport::Smtp,
            smtp_host: "smtp.example.com".into(),
            smtp_username: "user".into(),
            smtp_password: "pass".into(),
            ..MailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_log_mailer_records_messages() {
        let mailer = LogMailer::new();
        mailer
            .send(&OutgoingMail {
                to: "a@example.com".into(),
                subject: "Hello".into(),
                text: "Body".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hello");
    }

    #[tokio::test]
    async fn test_log_mailer_history_is_bounded() {
        let mailer = LogMailer::new();
        for i in 0..(LOG_MAILER_HISTORY + 5) {
            let mail = OutgoingMail {
                to: "a@example.com".into(),
                subject: format!("#{}", i),
                ..Default::default()
            };
            mailer.send(&mail).await.unwrap();
        }
        let sent = mailer.sent();
        assert_eq!(sent.len(), LOG_MAILER_HISTORY);
        assert_eq!(sent[0].subject, "#5");
    }

    #[tokio::test]
    async fn test_smtp_requires_host() {
        let config = MailConfig {
            smtp_host: String::new(),
            ..smtp_config()
        };
        assert!(SmtpMailer::new(&config).is_err());
        assert!(mailer_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_smtp_builds_message_with_overrides() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let message = mailer
            .build_message(&OutgoingMail {
                to: "reader@example.com".into(),
                subject: "Issue 1".into(),
                text: "plain".into(),
                html: Some("<p>html</p>".into()),
                from_name: Some("Weekly".into()),
                reply_to: Some("editor@example.com".into()),
            })
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: Weekly <no-reply@localhost>"));
        assert!(raw.contains("Reply-To: editor@example.com"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let result = mailer.build_message(&OutgoingMail {
            to: "not an address".into(),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
