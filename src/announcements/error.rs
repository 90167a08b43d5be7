use crate::announcements::record::AnnouncementId;
use crate::persistence::PersistenceError;

#[derive(Debug, thiserror::Error)]
pub enum AnnouncementError {
    #[error("announcement {0} was not found or has expired")]
    NotFound(AnnouncementId),
    #[error("announcement {0} already exists")]
    DuplicateId(AnnouncementId),
    #[error("only the author can manage announcement {0}")]
    Forbidden(AnnouncementId),
    #[error("failed to save announcements: {0}")]
    Persistence(#[from] PersistenceError),
}

impl AnnouncementError {
    /// Text shown to the user who triggered the failed action.
    pub fn user_message(&self) -> String {
        match self {
            AnnouncementError::NotFound(_) => {
                "This announcement has expired. Run `/announce` to start again.".to_string()
            }
            AnnouncementError::Forbidden(_) => {
                "You can only manage your own announcements.".to_string()
            }
            AnnouncementError::DuplicateId(_) => {
                "An announcement was just created, try again in a moment.".to_string()
            }
            AnnouncementError::Persistence(_) => {
                "Couldn't save the announcement, please try again.".to_string()
            }
        }
    }
}
