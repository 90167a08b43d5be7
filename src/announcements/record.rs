use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one announcement. Built from the author and the creation time
/// so that it is unique per author-moment and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnouncementId(String);

impl AnnouncementId {
    pub fn new(author_id: u64, created_at: DateTime<Utc>) -> Self {
        AnnouncementId(format!("{}-{}", author_id, created_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("malformed announcement id {0:?}")]
pub struct ParseIdError(String);

impl FromStr for AnnouncementId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (author, millis) = s.split_once('-').ok_or_else(|| ParseIdError(s.to_string()))?;
        if author.parse::<u64>().is_err() || millis.parse::<i64>().is_err() {
            return Err(ParseIdError(s.to_string()));
        }
        Ok(AnnouncementId(s.to_string()))
    }
}

/// Which of the two announcement surfaces an action is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Discord,
    Email,
}

/// Delivery status of one surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    #[default]
    Pending,
    Delivered,
    Failed {
        reason: String,
    },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// New contents for one payload, as submitted through an edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEdit {
    Discord { body: String },
    Email { subject: String, body: String },
}

impl PayloadEdit {
    pub fn payload(&self) -> Payload {
        match self {
            PayloadEdit::Discord { .. } => Payload::Discord,
            PayloadEdit::Email { .. } => Payload::Email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    id: AnnouncementId,
    author_id: u64,
    created_at: DateTime<Utc>,
    pub topic: String,
    pub discord_body: String,
    pub email_subject: String,
    pub email_body: String,
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub discord_delivery: Delivery,
    #[serde(default)]
    pub email_delivery: Delivery,
}

impl AnnouncementRecord {
    pub fn new(
        author_id: u64,
        topic: &str,
        details: Option<&str>,
        channel_id: Option<u64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let topic = topic.trim().to_string();
        let details = details.map(str::trim).filter(|details| !details.is_empty());

        let discord_body = match details {
            Some(details) => format!("📢 **{topic}**\n\n{details}"),
            None => format!("📢 **{topic}**"),
        };

        AnnouncementRecord {
            id: AnnouncementId::new(author_id, created_at),
            author_id,
            created_at,
            discord_body,
            email_subject: topic.clone(),
            email_body: details.unwrap_or(topic.as_str()).to_string(),
            topic,
            channel_id,
            discord_delivery: Delivery::Pending,
            email_delivery: Delivery::Pending,
        }
    }

    pub fn id(&self) -> &AnnouncementId {
        &self.id
    }

    pub fn author_id(&self) -> u64 {
        self.author_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_owned_by(&self, user_id: u64) -> bool {
        self.author_id == user_id
    }

    /// Replaces one payload, leaving the other untouched.
    pub fn apply(&mut self, edit: PayloadEdit) {
        match edit {
            PayloadEdit::Discord { body } => self.discord_body = body,
            PayloadEdit::Email { subject, body } => {
                self.email_subject = subject;
                self.email_body = body;
            }
        }
    }

    pub fn delivery(&self, payload: Payload) -> &Delivery {
        match payload {
            Payload::Discord => &self.discord_delivery,
            Payload::Email => &self.email_delivery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 18, 30, 0).unwrap()
    }

    #[test]
    fn id_is_derived_from_author_and_time() {
        let id = AnnouncementId::new(42, created_at());

        assert_eq!(id.as_str(), format!("42-{}", created_at().timestamp_millis()));
        assert_eq!(id.as_str().parse::<AnnouncementId>(), Ok(id));
    }

    #[test]
    fn malformed_ids_do_not_parse() {
        for input in ["", "42", "abc-123", "42-", "42-12x", "-5"] {
            assert!(input.parse::<AnnouncementId>().is_err(), "{input:?} parsed");
        }
    }

    #[test]
    fn payloads_are_derived_from_topic_without_details() {
        let record = AnnouncementRecord::new(1, "Meeting", None, None, created_at());

        assert!(record.discord_body.contains("Meeting"));
        assert_eq!(record.email_subject, "Meeting");
        assert_eq!(record.email_body, "Meeting");
    }

    #[test]
    fn payloads_include_details() {
        let record = AnnouncementRecord::new(
            1,
            " Meeting ",
            Some("Thursday at 6pm in room 4"),
            Some(99),
            created_at(),
        );

        assert_eq!(
            record.discord_body,
            "📢 **Meeting**\n\nThursday at 6pm in room 4"
        );
        assert_eq!(record.email_subject, "Meeting");
        assert_eq!(record.email_body, "Thursday at 6pm in room 4");
        assert_eq!(record.channel_id, Some(99));
    }

    #[test]
    fn editing_one_payload_leaves_the_other_alone() {
        // arrange
        let original = AnnouncementRecord::new(1, "Meeting", Some("details"), None, created_at());
        let mut discord_edited = original.clone();
        let mut email_edited = original.clone();

        // act
        discord_edited.apply(PayloadEdit::Discord {
            body: "new discord".to_string(),
        });
        email_edited.apply(PayloadEdit::Email {
            subject: "Room Change".to_string(),
            body: "new email".to_string(),
        });

        // assert
        assert_eq!(discord_edited.discord_body, "new discord");
        assert_eq!(discord_edited.email_subject, original.email_subject);
        assert_eq!(discord_edited.email_body, original.email_body);

        assert_eq!(email_edited.email_subject, "Room Change");
        assert_eq!(email_edited.email_body, "new email");
        assert_eq!(email_edited.discord_body, original.discord_body);
    }

    #[test]
    fn records_without_delivery_flags_deserialise_as_pending() {
        let record = AnnouncementRecord::new(1, "Meeting", None, None, created_at());
        let mut json = serde_json::to_value(&record).unwrap();
        let fields = json.as_object_mut().unwrap();
        fields.remove("discord_delivery");
        fields.remove("email_delivery");

        let parsed: AnnouncementRecord = serde_json::from_value(json).unwrap();

        assert_eq!(parsed.discord_delivery, Delivery::Pending);
        assert_eq!(parsed.email_delivery, Delivery::Pending);
    }
}
