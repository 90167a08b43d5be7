use crate::announcements::controls::{Control, ControlId};
use crate::announcements::record::{AnnouncementRecord, Delivery, Payload, PayloadEdit};
use crate::announcements::workflow::{
    AnnouncementState, SendOutcome, SideOutcome, TestSendOutcome,
};

use poise::serenity_prelude as serenity;
use serenity::{
    ActionRow, ActionRowComponent, ButtonStyle, Colour, CreateActionRow, CreateButton,
    CreateEmbed, CreateEmbedFooter, CreateInputText, CreateInteractionResponseMessage,
    CreateModal, EditInteractionResponse, InputTextStyle,
};
use std::collections::HashMap;

const FIELD_LIMIT: usize = 1024;
const DISCORD_BODY_LIMIT: u16 = 2000;
const EMAIL_SUBJECT_LIMIT: u16 = 200;
const EMAIL_BODY_LIMIT: u16 = 4000;

const BODY_INPUT: &str = "body";
const SUBJECT_INPUT: &str = "subject";

/// Everything shown for an announcement at one point of its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub state: AnnouncementState,
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub notice: Option<String>,
    pub controls: Vec<(ControlId, &'static str, ButtonStyle)>,
    pub footer: Option<String>,
}

impl Screen {
    pub fn draft(record: &AnnouncementRecord) -> Self {
        let mut screen = Screen::for_record(AnnouncementState::Draft, record);
        screen.title = format!("Draft: {}", record.topic);
        screen.description =
            "Review both versions below, edit them if needed, then send.".to_string();
        screen
    }

    pub fn sending(record: &AnnouncementRecord) -> Self {
        let mut screen = Screen::for_record(AnnouncementState::Sending, record);
        screen.title = format!("Sending: {}", record.topic);
        screen.description = "⏳ Posting to Discord and emailing the mailing list…".to_string();
        screen.controls.clear();
        screen
    }

    pub fn sent(outcome: &SendOutcome) -> Self {
        let record = &outcome.record;
        let mut screen = Screen::for_record(outcome.state, record);

        let (title, description) = match outcome.state {
            AnnouncementState::Sent => ("Sent", "📯 Your announcement is out!"),
            AnnouncementState::PartiallySent => (
                "Partially sent",
                "⚠️ One side failed. Fix the problem and use **Retry Send**, \
                 only the failed side will be sent again.",
            ),
            _ => (
                "Failed",
                "🔥 Nothing was sent. Fix the problem and use **Retry Send**.",
            ),
        };
        screen.title = format!("{title}: {}", record.topic);
        screen.description = description.to_string();
        screen.fields = vec![
            ("Discord".to_string(), side_status(&outcome.discord)),
            ("Email".to_string(), side_status(&outcome.email)),
        ];
        if outcome.state == AnnouncementState::Sent {
            screen.controls.clear();
            screen.footer = None;
        }
        screen
    }

    pub fn tested(outcome: &TestSendOutcome) -> Self {
        let mut screen = Screen::draft(&outcome.record);
        screen.notice = Some(match &outcome.result {
            Ok(report) if !report.delivered.is_empty() => {
                format!("✉️ Test email sent to {}.", report.delivered.join(", "))
            }
            Ok(_) => "🔥 Test email had no valid recipient.".to_string(),
            Err(e) => format!("🔥 Test email failed: {e}"),
        });
        screen
    }

    pub fn cancelled() -> Self {
        Screen::closed(
            AnnouncementState::Cancelled,
            "Announcement cancelled",
            "🧹 The draft was discarded. Nothing was sent.",
        )
    }

    pub fn expired() -> Self {
        Screen::closed(
            AnnouncementState::Expired,
            "Announcement expired",
            "⌛ This draft is no longer available. Run `/announce` to start again.",
        )
    }

    fn closed(state: AnnouncementState, title: &str, description: &str) -> Self {
        Screen {
            state,
            title: title.to_string(),
            description: description.to_string(),
            fields: Vec::new(),
            notice: None,
            controls: Vec::new(),
            footer: None,
        }
    }

    fn for_record(state: AnnouncementState, record: &AnnouncementRecord) -> Self {
        let mut fields = vec![
            (
                "Discord post".to_string(),
                truncate(&record.discord_body, FIELD_LIMIT),
            ),
            (
                "Email subject".to_string(),
                truncate(&record.email_subject, FIELD_LIMIT),
            ),
            (
                "Email body".to_string(),
                truncate(&record.email_body, FIELD_LIMIT),
            ),
        ];

        for (name, delivery) in [
            ("Discord status", &record.discord_delivery),
            ("Email status", &record.email_delivery),
        ] {
            match delivery {
                Delivery::Pending => {}
                Delivery::Delivered => fields.push((name.to_string(), "✅ delivered".to_string())),
                Delivery::Failed { reason } => {
                    fields.push((name.to_string(), truncate(&format!("❌ {reason}"), FIELD_LIMIT)))
                }
            }
        }

        let retrying = record.discord_delivery != Delivery::Pending
            || record.email_delivery != Delivery::Pending;
        let id = record.id();
        let controls = vec![
            (
                ControlId::new(Control::Edit(Payload::Discord), id),
                "Edit Discord",
                ButtonStyle::Secondary,
            ),
            (
                ControlId::new(Control::Edit(Payload::Email), id),
                "Edit Email",
                ButtonStyle::Secondary,
            ),
            (
                ControlId::new(Control::TestSend, id),
                "Test Email",
                ButtonStyle::Secondary,
            ),
            (
                ControlId::new(Control::Send, id),
                if retrying { "Retry Send" } else { "Send" },
                ButtonStyle::Success,
            ),
            (
                ControlId::new(Control::Cancel, id),
                "Cancel",
                ButtonStyle::Danger,
            ),
        ];

        Screen {
            state,
            title: record.topic.clone(),
            description: String::new(),
            fields,
            notice: None,
            controls,
            footer: Some(format!("Unsent drafts expire · {id}")),
        }
    }

    fn colour(&self) -> Colour {
        match self.state {
            AnnouncementState::Draft => Colour::BLURPLE,
            AnnouncementState::Sending => Colour::GOLD,
            AnnouncementState::Sent => Colour::DARK_GREEN,
            AnnouncementState::PartiallySent => Colour::ORANGE,
            AnnouncementState::Failed => Colour::RED,
            AnnouncementState::Cancelled | AnnouncementState::Expired => Colour::DARK_GREY,
        }
    }

    pub fn embed(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new()
            .title(&self.title)
            .description(&self.description)
            .colour(self.colour());

        for (name, value) in &self.fields {
            embed = embed.field(name, value, false);
        }

        if let Some(footer) = &self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }

        embed
    }

    pub fn components(&self) -> Vec<CreateActionRow> {
        if self.controls.is_empty() {
            return Vec::new();
        }

        let buttons = self
            .controls
            .iter()
            .map(|(control_id, label, style)| {
                CreateButton::new(control_id.custom_id())
                    .label(*label)
                    .style(*style)
            })
            .collect();

        vec![CreateActionRow::Buttons(buttons)]
    }

    fn content(&self) -> String {
        self.notice.clone().unwrap_or_default()
    }

    /// Initial ephemeral reply to `/announce`.
    pub fn reply(&self) -> poise::CreateReply {
        poise::CreateReply::default()
            .content(self.content())
            .embed(self.embed())
            .components(self.components())
            .ephemeral(true)
    }

    /// Replaces the message the pressed control belongs to.
    pub fn update_message(&self) -> CreateInteractionResponseMessage {
        CreateInteractionResponseMessage::new()
            .content(self.content())
            .embed(self.embed())
            .components(self.components())
    }

    /// Edits the message after the interaction was already answered.
    pub fn edit_response(&self) -> EditInteractionResponse {
        EditInteractionResponse::new()
            .content(self.content())
            .embed(self.embed())
            .components(self.components())
    }
}

fn side_status(outcome: &SideOutcome) -> String {
    match outcome {
        SideOutcome::Delivered(detail) => format!("✅ {detail}"),
        SideOutcome::AlreadyDelivered => "✅ already delivered earlier".to_string(),
        SideOutcome::Failed(reason) => truncate(&format!("❌ {reason}"), FIELD_LIMIT),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit - 1).collect();
    truncated.push('…');
    truncated
}

/// The form opened by an edit control, pre-filled with the current payload.
pub fn edit_modal(record: &AnnouncementRecord, payload: Payload) -> CreateModal {
    let custom_id = ControlId::new(Control::Submit(payload), record.id()).custom_id();

    match payload {
        Payload::Discord => CreateModal::new(custom_id, "Edit Discord post").components(vec![
            CreateActionRow::InputText(
                CreateInputText::new(InputTextStyle::Paragraph, "Message", BODY_INPUT)
                    .value(record.discord_body.clone())
                    .max_length(DISCORD_BODY_LIMIT)
                    .required(true),
            ),
        ]),
        Payload::Email => CreateModal::new(custom_id, "Edit email").components(vec![
            CreateActionRow::InputText(
                CreateInputText::new(InputTextStyle::Short, "Subject", SUBJECT_INPUT)
                    .value(record.email_subject.clone())
                    .max_length(EMAIL_SUBJECT_LIMIT)
                    .required(true),
            ),
            CreateActionRow::InputText(
                CreateInputText::new(InputTextStyle::Paragraph, "Body", BODY_INPUT)
                    .value(record.email_body.clone())
                    .max_length(EMAIL_BODY_LIMIT)
                    .required(true),
            ),
        ]),
    }
}

/// Collects the text inputs of a submitted form by their custom id.
pub fn modal_values(rows: &[ActionRow]) -> HashMap<String, String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(input) => Some((
                input.custom_id.clone(),
                input.value.clone().unwrap_or_default(),
            )),
            _ => None,
        })
        .collect()
}

/// Turns submitted form values into an edit of `payload`. Blank required
/// values give `None`.
pub fn payload_edit(payload: Payload, values: &HashMap<String, String>) -> Option<PayloadEdit> {
    let value = |name: &str| {
        values
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    match payload {
        Payload::Discord => Some(PayloadEdit::Discord {
            body: value(BODY_INPUT)?,
        }),
        Payload::Email => Some(PayloadEdit::Email {
            subject: value(SUBJECT_INPUT)?,
            body: value(BODY_INPUT)?,
        }),
    }
}
