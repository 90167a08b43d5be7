use crate::announcements::view::Screen;
use crate::{err_say, Context, Error};

use chrono::Utc;

/// Draft an announcement for Discord and the mailing list.
///
/// The draft is only visible to you. Both versions start from the topic and
/// details you give here and can be edited separately before sending. Drafts
/// that are not sent or cancelled expire after a while.
#[poise::command(slash_command, guild_only)]
pub async fn announce(
    ctx: Context<'_>,
    #[description = "What the announcement is about"]
    #[min_length = 1]
    #[max_length = 100]
    topic: String,
    #[description = "The announcement text"]
    #[max_length = 1500]
    details: Option<String>,
) -> Result<(), Error> {
    if topic.trim().is_empty() {
        err_say(&ctx, "The topic can't be blank.").await?;
        return Ok(());
    }

    let record = match ctx
        .data()
        .announcements
        .create(
            ctx.author().id.get(),
            &topic,
            details.as_deref(),
            Some(ctx.channel_id().get()),
            Utc::now(),
        )
        .await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!("Failed to create announcement: {}", e);
            err_say(&ctx, &e.user_message()).await?;
            return Ok(());
        }
    };

    ctx.send(Screen::draft(&record).reply()).await?;

    Ok(())
}
