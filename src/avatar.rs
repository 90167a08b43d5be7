use std::time::Duration;

/// Bound on downloading the image and updating the profile. Avatar changes are
/// heavily rate limited.
pub const AVATAR_TIMEOUT: Duration = Duration::from_secs(15);

pub fn is_supported_image(content_type: Option<&str>) -> bool {
    matches!(
        content_type,
        Some("image/png" | "image/jpeg" | "image/gif" | "image/webp")
    )
}

pub mod commands {
    use super::{is_supported_image, AVATAR_TIMEOUT};
    use crate::{err_say, Context, Error};

    use poise::serenity_prelude as serenity;
    use serenity::{CreateAttachment, EditProfile};

    /// Change the bot's avatar.
    #[poise::command(
        slash_command,
        guild_only,
        required_permissions = "ADMINISTRATOR"
    )]
    pub async fn avatar(
        ctx: Context<'_>,
        #[description = "A PNG, JPEG, GIF or WebP image."] image: serenity::Attachment,
    ) -> Result<(), Error> {
        if !is_supported_image(image.content_type.as_deref()) {
            err_say(&ctx, "That file isn't a PNG, JPEG, GIF or WebP image.").await?;
            return Ok(());
        }

        ctx.defer_ephemeral().await?;

        let update = async {
            let bytes = image.download().await?;
            let attachment = CreateAttachment::bytes(bytes, image.filename.clone());
            let mut user = ctx.http().get_current_user().await?;
            user.edit(ctx.serenity_context(), EditProfile::new().avatar(&attachment))
                .await?;
            Ok::<_, serenity::Error>(())
        };

        match tokio::time::timeout(AVATAR_TIMEOUT, update).await {
            Ok(Ok(())) => {
                tracing::info!("{} changed the avatar", ctx.author().name);
                ctx.say("🖼️ Avatar updated.").await?;
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to change the avatar: {}", e);
                err_say(&ctx, "Discord refused the new avatar, try again later.").await?;
            }
            Err(_) => {
                tracing::warn!("Changing the avatar timed out after {:?}", AVATAR_TIMEOUT);
                err_say(&ctx, "Discord didn't answer in time, try again later.").await?;
            }
        }

        Ok(())
    }
}
