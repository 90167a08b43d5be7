use crate::{Data, Error};

use poise::serenity_prelude as serenity;
use serenity::{ChannelId, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Add,
    Remove,
    NotAllowed,
}

pub fn role_toggle(allowed: &[RoleId], role: RoleId, member_roles: &[RoleId]) -> RoleChange {
    if !allowed.contains(&role) {
        RoleChange::NotAllowed
    } else if member_roles.contains(&role) {
        RoleChange::Remove
    } else {
        RoleChange::Add
    }
}

/// The role to grant for a message posted in the introductions channel, if
/// any. `member_roles` is `None` when the gateway didn't include the author's
/// roles.
pub fn member_role_to_grant(
    introductions: Option<ChannelId>,
    member_role: Option<RoleId>,
    channel: ChannelId,
    author_is_bot: bool,
    member_roles: Option<&[RoleId]>,
) -> Option<RoleId> {
    let member_role = member_role?;

    if author_is_bot || introductions != Some(channel) {
        return None;
    }

    match member_roles {
        Some(roles) if roles.contains(&member_role) => None,
        _ => Some(member_role),
    }
}

/// Gives the member role to whoever introduces themselves.
pub async fn message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let Some(role) = member_role_to_grant(
        data.config.introductions_channel,
        data.config.member_role,
        message.channel_id,
        message.author.bot,
        message.member.as_ref().map(|member| member.roles.as_slice()),
    ) else {
        return Ok(());
    };

    ctx.http
        .add_member_role(guild_id, message.author.id, role, Some("Posted an introduction"))
        .await?;

    tracing::info!("Gave member role to {}", message.author.name);

    Ok(())
}

pub mod commands {
    use super::{role_toggle, RoleChange};
    use crate::{err_say, Context, Error};

    use poise::serenity_prelude as serenity;

    /// Join or leave a role.
    ///
    /// Only roles the server has marked as self-assignable can be toggled.
    #[poise::command(slash_command, guild_only)]
    pub async fn role(
        ctx: Context<'_>,
        #[description = "The role to join or leave."] role: serenity::Role,
    ) -> Result<(), Error> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let Some(member) = ctx.author_member().await else {
            err_say(&ctx, "Couldn't look up your server membership.").await?;
            return Ok(());
        };

        let user_id = ctx.author().id;
        let http = ctx.http();

        match role_toggle(
            &ctx.data().config.self_assignable_roles,
            role.id,
            &member.roles,
        ) {
            RoleChange::NotAllowed => {
                err_say(&ctx, &format!("**{}** isn't a self-assignable role.", role.name))
                    .await?;
            }
            RoleChange::Add => {
                http.add_member_role(guild_id, user_id, role.id, Some("Self-assigned"))
                    .await?;
                ctx.send(
                    poise::CreateReply::default()
                        .content(format!("✅ You now have **{}**.", role.name))
                        .ephemeral(true),
                )
                .await?;
            }
            RoleChange::Remove => {
                http.remove_member_role(guild_id, user_id, role.id, Some("Self-removed"))
                    .await?;
                ctx.send(
                    poise::CreateReply::default()
                        .content(format!("👋 You no longer have **{}**.", role.name))
                        .ephemeral(true),
                )
                .await?;
            }
        }

        Ok(())
    }
}
