use crate::announcements::record::{AnnouncementId, Payload};

const PREFIX: &str = "announce";

/// An interactive control attached to an announcement draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Opens the edit form for a payload.
    Edit(Payload),
    /// The edit form for a payload was submitted.
    Submit(Payload),
    TestSend,
    Send,
    Cancel,
}

impl Control {
    fn verb(self) -> &'static str {
        match self {
            Control::Edit(Payload::Discord) => "edit-discord",
            Control::Edit(Payload::Email) => "edit-email",
            Control::Submit(Payload::Discord) => "submit-discord",
            Control::Submit(Payload::Email) => "submit-email",
            Control::TestSend => "test",
            Control::Send => "send",
            Control::Cancel => "cancel",
        }
    }

    fn from_verb(verb: &str) -> Option<Self> {
        Some(match verb {
            "edit-discord" => Control::Edit(Payload::Discord),
            "edit-email" => Control::Edit(Payload::Email),
            "submit-discord" => Control::Submit(Payload::Discord),
            "submit-email" => Control::Submit(Payload::Email),
            "test" => Control::TestSend,
            "send" => Control::Send,
            "cancel" => Control::Cancel,
            _ => return None,
        })
    }
}

/// A control bound to the announcement it acts on. This is what goes into a
/// Discord component's `custom_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlId {
    pub control: Control,
    pub id: AnnouncementId,
}

impl ControlId {
    pub fn new(control: Control, id: &AnnouncementId) -> Self {
        ControlId {
            control,
            id: id.clone(),
        }
    }

    pub fn custom_id(&self) -> String {
        format!("{}:{}:{}", PREFIX, self.control.verb(), self.id)
    }

    /// Decodes a `custom_id`. Ids that belong to other features give `None`.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(3, ':');

        if parts.next()? != PREFIX {
            return None;
        }
        let control = Control::from_verb(parts.next()?)?;
        let id = parts.next()?.parse().ok()?;

        Some(ControlId { control, id })
    }
}
