use crate::config::SmtpConfig;
use crate::email::html::render_html;
use crate::email::recipients::SheetRecipients;
use crate::email::retry::{retry, Failure, RetryPolicy};
use crate::email::{BulkReport, EmailError, EmailGateway};

use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serenity::async_trait;
use std::time::Duration;
use uuid::Uuid;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends announcement emails over SMTP to the spreadsheet mailing list.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: SheetRecipients,
    retry_policy: RetryPolicy,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, recipients: SheetRecipients) -> Result<Self, EmailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        // port 465 is implicit TLS, everything else negotiates STARTTLS
        let relay = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        };
        let builder = relay.map_err(|e| {
            tracing::error!("Invalid SMTP relay {}: {}", config.host, e);
            EmailError::Configuration(vec!["SMTP_HOST"])
        })?;

        let transport = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(SEND_TIMEOUT))
            .build();

        let from: Mailbox = config.from.parse().map_err(|e| {
            tracing::error!("Invalid SMTP_FROM address {:?}: {}", config.from, e);
            EmailError::Configuration(vec!["SMTP_FROM"])
        })?;

        Ok(SmtpMailer {
            transport,
            from,
            recipients,
            retry_policy: RetryPolicy::default(),
        })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn build_message(
        &self,
        subject: &str,
        body: &str,
        bcc: &[Mailbox],
    ) -> Result<Message, EmailError> {
        let mut builder = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(self.from.clone())
            .subject(subject);

        for mailbox in bcc {
            builder = builder.bcc(mailbox.clone());
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                body.to_string(),
                render_html(body),
            ))
            .map_err(|e| EmailError::SendFailed(format!("failed to build message: {e}")))
    }

    async fn send_once(&self, message: Message) -> Result<(), Failure<String>> {
        match tokio::time::timeout(SEND_TIMEOUT, self.transport.send(message)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.is_permanent() => Err(Failure::Permanent(e.to_string())),
            Ok(Err(e)) => Err(Failure::Transient(e.to_string())),
            Err(_) => Err(Failure::Transient(format!(
                "no response from the mail server after {SEND_TIMEOUT:?}"
            ))),
        }
    }
}

#[async_trait]
impl EmailGateway for SmtpMailer {
    async fn fetch_recipients(&self) -> Result<Vec<String>, EmailError> {
        self.recipients.fetch().await
    }

    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<BulkReport, EmailError> {
        let mut report = BulkReport::default();
        let mut bcc = Vec::with_capacity(recipients.len());

        for address in recipients {
            match address.parse::<Mailbox>() {
                Ok(mailbox) => {
                    bcc.push(mailbox);
                    report.delivered.push(address.clone());
                }
                Err(e) => {
                    tracing::warn!("Skipping recipient {:?}: {}", address, e);
                    report.failed.push(address.clone());
                }
            }
        }

        if bcc.is_empty() {
            tracing::warn!("No deliverable recipients for {:?}", subject);
            return Ok(report);
        }

        let message = self.build_message(subject, body, &bcc)?;

        retry(self.retry_policy, || self.send_once(message.clone()))
            .await
            .map_err(EmailError::SendFailed)?;

        tracing::info!(
            "Sent {:?} to {} recipients ({} skipped)",
            subject,
            report.delivered.len(),
            report.failed.len()
        );

        Ok(report)
    }

    fn test_recipient(&self) -> Result<String, EmailError> {
        Ok(self.from.email.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetConfig;
    use lettre::Address;

    fn mailer() -> SmtpMailer {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "bot".to_string(),
            password: "secret".to_string(),
            from: "bot@example.com".to_string(),
        };
        let sheet = SheetConfig {
            sheet_id: "sheet".to_string(),
            api_key: "key".to_string(),
            range: "A:B".to_string(),
        };
        SmtpMailer::new(&config, SheetRecipients::new(reqwest::Client::new(), sheet)).unwrap()
    }

    fn mailbox(address: &str) -> Mailbox {
        address.parse().unwrap()
    }

    #[tokio::test]
    async fn message_goes_to_the_sender_and_blind_copies_the_list() {
        // arrange
        let mailer = mailer();
        let bcc = [mailbox("a@x.com"), mailbox("b@x.com")];

        // act
        let message = mailer.build_message("Meeting", "Room **4**", &bcc).unwrap();

        // assert
        let envelope: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(Address::to_string)
            .collect();
        assert!(envelope.contains(&"bot@example.com".to_string()));
        assert!(envelope.contains(&"a@x.com".to_string()));
        assert!(envelope.contains(&"b@x.com".to_string()));

        let headers = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(headers.contains("To: bot@example.com"));
        assert!(!headers.contains("Bcc:"));
        assert!(!headers.contains("a@x.com"));
    }

    #[tokio::test]
    async fn unparseable_recipients_are_reported_without_sending() {
        // arrange
        let mailer = mailer();

        // act
        let report = mailer
            .send_bulk("Meeting", "Room 4", &["not an address".to_string()])
            .await
            .unwrap();

        // assert
        assert!(report.delivered.is_empty());
        assert_eq!(report.failed, vec!["not an address".to_string()]);
    }

    #[tokio::test]
    async fn test_recipient_is_the_sending_account() {
        assert_eq!(mailer().test_recipient().unwrap(), "bot@example.com");
    }

    #[tokio::test]
    async fn malformed_from_address_is_a_configuration_error() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: "bot".to_string(),
            password: "secret".to_string(),
            from: "not an address".to_string(),
        };
        let sheet = SheetConfig {
            sheet_id: "sheet".to_string(),
            api_key: "key".to_string(),
            range: "A:B".to_string(),
        };

        let result = SmtpMailer::new(&config, SheetRecipients::new(reqwest::Client::new(), sheet));

        assert!(matches!(result, Err(EmailError::Configuration(vars)) if vars == vec!["SMTP_FROM"]));
    }
}
