use crate::announcements::error::AnnouncementError;
use crate::announcements::record::{
    AnnouncementId, AnnouncementRecord, Delivery, PayloadEdit,
};
use crate::announcements::store::AnnouncementStore;
use crate::email::{BulkReport, EmailError, EmailGateway};

use chrono::{DateTime, Utc};
use serenity::{
    all::{ChannelId, Http},
    async_trait,
};
use std::sync::Arc;

/// Where an announcement is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementState {
    Draft,
    Sending,
    Sent,
    PartiallySent,
    Failed,
    Cancelled,
    Expired,
}

/// Result of one delivery surface during a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideOutcome {
    Delivered(String),
    AlreadyDelivered,
    Failed(String),
}

impl SideOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, SideOutcome::Failed(_))
    }

    fn as_delivery(&self) -> Delivery {
        match self {
            SideOutcome::Delivered(_) | SideOutcome::AlreadyDelivered => Delivery::Delivered,
            SideOutcome::Failed(reason) => Delivery::Failed {
                reason: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub state: AnnouncementState,
    pub record: AnnouncementRecord,
    pub discord: SideOutcome,
    pub email: SideOutcome,
}

#[derive(Debug, Clone)]
pub struct TestSendOutcome {
    pub record: AnnouncementRecord,
    pub result: Result<BulkReport, EmailError>,
}

/// Posts the Discord side of an announcement.
#[async_trait]
pub trait AnnouncementPoster: Send + Sync {
    async fn post(&self, channel_id: u64, body: &str) -> Result<(), String>;
}

pub struct ChannelPoster {
    http: Arc<Http>,
}

impl ChannelPoster {
    pub fn new(http: Arc<Http>) -> Self {
        ChannelPoster { http }
    }
}

#[async_trait]
impl AnnouncementPoster for ChannelPoster {
    async fn post(&self, channel_id: u64, body: &str) -> Result<(), String> {
        ChannelId::new(channel_id)
            .say(self.http.as_ref(), body)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Drives announcements from draft to sent.
///
/// Each transition checks that the acting user is the author and that the
/// record is still live; an id that cannot be found surfaces as
/// [`AnnouncementError::NotFound`], which callers render as expired.
pub struct Workflow {
    store: Arc<AnnouncementStore>,
    email: Arc<dyn EmailGateway>,
    poster: Arc<dyn AnnouncementPoster>,
    announcement_channel: Option<u64>,
}

impl Workflow {
    pub fn new(
        store: Arc<AnnouncementStore>,
        email: Arc<dyn EmailGateway>,
        poster: Arc<dyn AnnouncementPoster>,
        announcement_channel: Option<u64>,
    ) -> Self {
        Workflow {
            store,
            email,
            poster,
            announcement_channel,
        }
    }

    pub async fn create(
        &self,
        author_id: u64,
        topic: &str,
        details: Option<&str>,
        channel_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<AnnouncementRecord, AnnouncementError> {
        let record = AnnouncementRecord::new(author_id, topic, details, channel_id, now);
        self.store.create(record.clone()).await?;
        tracing::info!("User {} drafted announcement {}", author_id, record.id());
        Ok(record)
    }

    /// Fetches a live record on behalf of its author.
    pub async fn open(
        &self,
        id: &AnnouncementId,
        actor_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AnnouncementRecord, AnnouncementError> {
        let record = self
            .store
            .get(id, now)
            .await
            .ok_or_else(|| AnnouncementError::NotFound(id.clone()))?;

        if !record.is_owned_by(actor_id) {
            tracing::warn!(
                "User {} tried to manage announcement {} owned by {}",
                actor_id,
                id,
                record.author_id()
            );
            return Err(AnnouncementError::Forbidden(id.clone()));
        }

        Ok(record)
    }

    pub async fn edit(
        &self,
        id: &AnnouncementId,
        actor_id: u64,
        edit: PayloadEdit,
        now: DateTime<Utc>,
    ) -> Result<AnnouncementRecord, AnnouncementError> {
        self.open(id, actor_id, now).await?;
        let payload = edit.payload();
        let record = self.store.update(id, now, |record| record.apply(edit)).await?;
        tracing::debug!("Announcement {} {:?} payload edited", id, payload);
        Ok(record)
    }

    /// Emails the current payload to the test recipient only. Failures are
    /// returned in the outcome and leave the record as it was.
    pub async fn test_send(
        &self,
        id: &AnnouncementId,
        actor_id: u64,
        now: DateTime<Utc>,
    ) -> Result<TestSendOutcome, AnnouncementError> {
        let record = self.open(id, actor_id, now).await?;

        let result = match self.email.test_recipient() {
            Ok(recipient) => {
                self.email
                    .send_bulk(&record.email_subject, &record.email_body, &[recipient])
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::warn!("Test send of announcement {} failed: {}", id, e);
        }

        Ok(TestSendOutcome { record, result })
    }

    pub async fn send(
        &self,
        id: &AnnouncementId,
        actor_id: u64,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome, AnnouncementError> {
        let mut record = self.open(id, actor_id, now).await?;
        tracing::info!("Sending announcement {}", id);

        let discord = if record.discord_delivery.is_delivered() {
            SideOutcome::AlreadyDelivered
        } else {
            self.deliver_to_discord(&record).await
        };

        let email = if record.email_delivery.is_delivered() {
            SideOutcome::AlreadyDelivered
        } else {
            self.deliver_by_email(&record).await
        };

        let state = match (discord.succeeded(), email.succeeded()) {
            (true, true) => AnnouncementState::Sent,
            (false, false) => AnnouncementState::Failed,
            _ => AnnouncementState::PartiallySent,
        };

        record.discord_delivery = discord.as_delivery();
        record.email_delivery = email.as_delivery();

        if state == AnnouncementState::Sent {
            // the announcement is out whether or not the record can be removed
            match self.store.delete(id).await {
                Ok(()) => tracing::info!("Announcement {} sent", id),
                Err(e) => tracing::error!("Announcement {} sent but not removed: {}", id, e),
            }
        } else {
            let (discord_delivery, email_delivery) =
                (record.discord_delivery.clone(), record.email_delivery.clone());
            match self
                .store
                .update(id, now, |stored| {
                    stored.discord_delivery = discord_delivery;
                    stored.email_delivery = email_delivery;
                })
                .await
            {
                Ok(updated) => record = updated,
                Err(AnnouncementError::NotFound(_)) => {
                    tracing::warn!("Announcement {} expired while it was being sent", id)
                }
                Err(e) => tracing::error!("Failed to record delivery of {}: {}", id, e),
            }
            tracing::warn!(
                "Announcement {} {:?}: discord {:?}, email {:?}",
                id,
                state,
                discord,
                email
            );
        }

        Ok(SendOutcome {
            state,
            record,
            discord,
            email,
        })
    }

    pub async fn cancel(
        &self,
        id: &AnnouncementId,
        actor_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(), AnnouncementError> {
        self.open(id, actor_id, now).await?;
        self.store.delete(id).await?;
        tracing::info!("Announcement {} cancelled", id);
        Ok(())
    }

    async fn deliver_to_discord(&self, record: &AnnouncementRecord) -> SideOutcome {
        let Some(channel_id) = self.announcement_channel.or(record.channel_id) else {
            return SideOutcome::Failed("no announcement channel is configured".to_string());
        };

        match self.poster.post(channel_id, &record.discord_body).await {
            Ok(()) => SideOutcome::Delivered(format!("posted in <#{channel_id}>")),
            Err(e) => {
                tracing::error!("Failed to post announcement {}: {}", record.id(), e);
                SideOutcome::Failed(e)
            }
        }
    }

    async fn deliver_by_email(&self, record: &AnnouncementRecord) -> SideOutcome {
        let recipients = match self.email.fetch_recipients().await {
            Ok(recipients) if recipients.is_empty() => {
                return SideOutcome::Failed("the mailing list is empty".to_string())
            }
            Ok(recipients) => recipients,
            Err(e) => return SideOutcome::Failed(e.to_string()),
        };

        match self
            .email
            .send_bulk(&record.email_subject, &record.email_body, &recipients)
            .await
        {
            Ok(report) if report.delivered.is_empty() => {
                SideOutcome::Failed("no valid addresses on the mailing list".to_string())
            }
            Ok(report) if report.failed.is_empty() => {
                SideOutcome::Delivered(format!("emailed {} recipients", report.delivered.len()))
            }
            Ok(report) => SideOutcome::Delivered(format!(
                "emailed {} recipients, skipped {}",
                report.delivered.len(),
                report.failed.len()
            )),
            Err(e) => {
                tracing::error!("Failed to email announcement {}: {}", record.id(), e);
                SideOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    pub const TEST_RECIPIENT: &str = "bot@example.com";

    #[derive(Default)]
    pub struct FakeEmail {
        pub recipients: Vec<String>,
        pub failing: AtomicBool,
        pub sent: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl FakeEmail {
        pub fn with_recipients(recipients: &[&str]) -> Self {
            FakeEmail {
                recipients: recipients.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<(String, String, Vec<String>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailGateway for FakeEmail {
        async fn fetch_recipients(&self) -> Result<Vec<String>, EmailError> {
            Ok(self.recipients.clone())
        }

        async fn send_bulk(
            &self,
            subject: &str,
            body: &str,
            recipients: &[String],
        ) -> Result<BulkReport, EmailError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EmailError::SendFailed("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push((
                subject.to_string(),
                body.to_string(),
                recipients.to_vec(),
            ));
            Ok(BulkReport {
                delivered: recipients.to_vec(),
                failed: Vec::new(),
            })
        }

        fn test_recipient(&self) -> Result<String, EmailError> {
            Ok(TEST_RECIPIENT.to_string())
        }
    }

    #[derive(Default)]
    pub struct FakePoster {
        pub failing: AtomicBool,
        pub posts: Mutex<Vec<(u64, String)>>,
    }

    impl FakePoster {
        pub fn posts(&self) -> Vec<(u64, String)> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnnouncementPoster for FakePoster {
        async fn post(&self, channel_id: u64, body: &str) -> Result<(), String> {
            if self.failing.load(Ordering::SeqCst) {
                return Err("Missing Permissions".to_string());
            }
            self.posts
                .lock()
                .unwrap()
                .push((channel_id, body.to_string()));
            Ok(())
        }
    }
}
