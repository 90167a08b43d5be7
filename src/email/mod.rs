pub mod html;
pub mod recipients;
pub mod retry;
pub mod smtp;

use crate::config::EmailConfig;
use recipients::SheetRecipients;
use smtp::SmtpMailer;

use serenity::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum EmailError {
    #[error("email is not configured (missing {})", .0.join(", "))]
    Configuration(Vec<&'static str>),
    #[error("failed to read the mailing list: {0}")]
    Sheet(String),
    #[error("failed to send email: {0}")]
    SendFailed(String),
}

/// Addresses a bulk send went out to and the ones that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    /// The normalised, deduplicated mailing list.
    async fn fetch_recipients(&self) -> Result<Vec<String>, EmailError>;

    /// Sends one message with every recipient blind-copied.
    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<BulkReport, EmailError>;

    /// Where test sends go.
    fn test_recipient(&self) -> Result<String, EmailError>;
}

/// Stands in for the mailer when credentials are missing so that only the
/// email side of the bot is disabled.
pub struct UnconfiguredGateway {
    missing: Vec<&'static str>,
}

impl UnconfiguredGateway {
    pub fn new(missing: Vec<&'static str>) -> Self {
        UnconfiguredGateway { missing }
    }

    fn error(&self) -> EmailError {
        EmailError::Configuration(self.missing.clone())
    }
}

#[async_trait]
impl EmailGateway for UnconfiguredGateway {
    async fn fetch_recipients(&self) -> Result<Vec<String>, EmailError> {
        Err(self.error())
    }

    async fn send_bulk(
        &self,
        _subject: &str,
        _body: &str,
        _recipients: &[String],
    ) -> Result<BulkReport, EmailError> {
        Err(self.error())
    }

    fn test_recipient(&self) -> Result<String, EmailError> {
        Err(self.error())
    }
}

pub fn gateway_from_config(
    config: &EmailConfig,
    http_client: reqwest::Client,
) -> Arc<dyn EmailGateway> {
    let (smtp, sheet) = match (&config.smtp, &config.sheet) {
        (Some(smtp), Some(sheet)) => (smtp, sheet),
        _ => {
            tracing::warn!(
                "Email is disabled, missing: {}",
                config.missing.join(", ")
            );
            return Arc::new(UnconfiguredGateway::new(config.missing.clone()));
        }
    };

    match SmtpMailer::new(smtp, SheetRecipients::new(http_client, sheet.clone())) {
        Ok(mailer) => {
            tracing::info!("Email enabled via {}:{}", smtp.host, smtp.port);
            Arc::new(mailer)
        }
        Err(EmailError::Configuration(invalid)) => Arc::new(UnconfiguredGateway::new(invalid)),
        Err(e) => {
            tracing::error!("Email is disabled: {}", e);
            Arc::new(UnconfiguredGateway::new(Vec::new()))
        }
    }
}
