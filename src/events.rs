//! Gateway event handling and framework error reporting.

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

use crate::error::UserError;
use crate::{Context, Data, Error};

const COLOR_WELCOME: u32 = 0x57F287;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "{} is connected to {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
            ctx.set_activity(Some(serenity::ActivityData::custom(
                data.config.status_message.clone(),
            )));
        }
        serenity::FullEvent::CacheReady { guilds } => {
            let names: Vec<String> = guilds
                .iter()
                .map(|id| id.name(&ctx.cache).unwrap_or_else(|| id.to_string()))
                .collect();
            info!("Serving guilds: {}", names.join(", "));
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            welcome_member(ctx, data, new_member).await;
        }
        _ => {}
    }
    Ok(())
}

/// Posts a welcome embed when the guild has a welcome channel.
async fn welcome_member(ctx: &serenity::Context, data: &Data, member: &serenity::Member) {
    let guild_id = member.guild_id;
    let channel_id = match data.db.get_welcome_channel_id(guild_id.get()).await {
        Ok(Some(id)) => serenity::ChannelId::new(id),
        Ok(None) => return,
        Err(e) => {
            error!("Failed to read welcome channel for guild {}: {}", guild_id, e);
            return;
        }
    };

    let guild_name = guild_id
        .name(&ctx.cache)
        .unwrap_or_else(|| "the server".to_string());
    let embed = serenity::CreateEmbed::new()
        .title("Welcome!")
        .description(welcome_text(&guild_name, member.user.id.get()))
        .thumbnail(member.user.face())
        .color(COLOR_WELCOME);

    if let Err(e) = channel_id
        .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        warn!(
            "Failed to post welcome for {} in channel {}: {}",
            member.user.id, channel_id, e
        );
    }
}

fn welcome_text(guild_name: &str, user_id: u64) -> String {
    format!(
        "Welcome to **{}**, <@{}>! We're glad to have you here.",
        guild_name, user_id
    )
}

pub async fn post_command(ctx: Context<'_>) {
    info!(
        command = %ctx.command().qualified_name,
        user = %ctx.author().id,
        guild = ?ctx.guild_id(),
        channel = %ctx.channel_id(),
        "Command completed"
    );
}

/// Replies to the author for usage mistakes and logs everything else.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start the bot: {:?}", error)
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            if let Some(user_error) = error.downcast_ref::<UserError>() {
                debug!("{} used {} incorrectly: {}", ctx.author().name, ctx.command().name, user_error);
                reply_ephemeral(ctx, user_error.to_string()).await;
                return;
            }
            error!(
                "Error in command `{}` invoked by {}: {:?}",
                ctx.command().qualified_name,
                ctx.author().id,
                error
            );
            reply_ephemeral(ctx, "Something went wrong while running that command.").await;
        }
        poise::FrameworkError::MissingUserPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            let message = match missing_permissions {
                Some(missing) => UserError::MissingUserPermissions(missing).to_string(),
                None => UserError::CheckFailed.to_string(),
            };
            reply_ephemeral(ctx, message).await;
        }
        poise::FrameworkError::MissingBotPermissions {
            missing_permissions,
            ctx,
            ..
        } => {
            reply_ephemeral(
                ctx,
                UserError::MissingBotPermissions(missing_permissions).to_string(),
            )
            .await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            reply_ephemeral(ctx, UserError::GuildOnly.to_string()).await;
        }
        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            if let Some(error) = error {
                error!("Check for `{}` failed: {:?}", ctx.command().name, error);
            }
            reply_ephemeral(ctx, UserError::CheckFailed.to_string()).await;
        }
        poise::FrameworkError::ArgumentParse { input, ctx, .. } => {
            let input = input.unwrap_or_else(|| ctx.invocation_string());
            reply_ephemeral(ctx, UserError::BadArgs(input).to_string()).await;
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e)
            }
        }
    }
}

async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) {
    let reply = poise::CreateReply::default().ephemeral(true).content(content);
    if let Err(e) = ctx.send(reply).await {
        error!("Failed to send error reply: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_text() {
        assert_eq!(
            welcome_text("Perch", 42),
            "Welcome to **Perch**, <@42>! We're glad to have you here."
        );
    }
}
