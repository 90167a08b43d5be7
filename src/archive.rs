use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, EditChannel, Http};

pub fn archived_notice() -> &'static str {
    "🗄️ This channel has been archived."
}

/// Uses Discord's relative timestamp so every reader sees it in their own
/// timezone.
pub fn scheduled_notice(due_at: DateTime<Utc>) -> String {
    format!(
        "🗄️ This channel will be archived <t:{}:R>.",
        due_at.timestamp()
    )
}

/// Moves a channel under the archive category and tells its members.
pub async fn archive_channel(
    http: &Http,
    channel_id: ChannelId,
    category: ChannelId,
) -> Result<(), serenity::Error> {
    channel_id
        .edit(http, EditChannel::new().category(Some(category)))
        .await?;

    tracing::info!("Archived channel {} into {}", channel_id, category);

    if let Err(e) = channel_id.say(http, archived_notice()).await {
        tracing::warn!("Failed to post archive notice in {}: {}", channel_id, e);
    }

    Ok(())
}

pub mod commands {
    use super::scheduled_notice;
    use crate::schedule::ScheduledAction;
    use crate::{err_say, Context, Error};

    use chrono::Utc;

    /// Archive this channel.
    ///
    /// Moves the channel into the archive category, either now or after the
    /// given number of hours. Running it again replaces any earlier schedule.
    #[poise::command(
        slash_command,
        guild_only,
        required_permissions = "MANAGE_CHANNELS"
    )]
    pub async fn archive(
        ctx: Context<'_>,
        #[description = "Hours to wait before archiving."]
        #[min = 1]
        #[max = 720]
        delay_hours: Option<u32>,
    ) -> Result<(), Error> {
        let Some(category) = ctx.data().config.archive_category else {
            err_say(&ctx, "Archiving isn't set up on this server.").await?;
            return Ok(());
        };

        let channel_id = ctx.channel_id();

        match delay_hours {
            None => {
                ctx.defer_ephemeral().await?;
                super::archive_channel(ctx.http(), channel_id, category).await?;
                ctx.say("Done.").await?;
            }
            Some(hours) => {
                let due_at = Utc::now() + chrono::Duration::hours(i64::from(hours));
                ctx.data()
                    .tasks
                    .schedule(
                        due_at,
                        ScheduledAction::ArchiveChannel {
                            channel_id: channel_id.get(),
                        },
                    )
                    .await?;
                ctx.say(scheduled_notice(due_at)).await?;
            }
        }

        Ok(())
    }
}
