pub mod commands;
pub mod controls;
pub mod error;
pub mod interactions;
pub mod record;
pub mod store;
pub mod view;
pub mod workflow;

pub use error::AnnouncementError;
pub use store::AnnouncementStore;
pub use workflow::Workflow;
