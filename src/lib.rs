pub mod announcements;
pub mod archive;
pub mod avatar;
pub mod config;
pub mod email;
pub mod fun;
pub mod handlers;
pub mod persistence;
pub mod roles;
pub mod schedule;

pub use config::Config;

use std::sync::Arc;

pub struct Data {
    pub config: Config,
    pub announcements: announcements::Workflow,
    pub tasks: Arc<schedule::TaskQueue>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Replies with an error only the invoking user can see.
pub async fn err_say(ctx: &Context<'_>, message: &str) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(format!("🔥 {message}"))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
