use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::{error, info};

use super::{COLOR_BLUE, COLOR_BLURPLE, COLOR_GREEN, COLOR_PURPLE, COLOR_RED};

const POLL_EMOJIS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];
const MAX_PREFIX_CHARS: usize = 5;

/// Say hello
#[poise::command(prefix_command, slash_command)]
pub async fn hello(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Hello!")
        .description("Hey there! I'm alive and ready to help.")
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Requested by {}",
            ctx.author().display_name()
        )))
        .color(COLOR_BLURPLE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Start a reaction poll: `!poll "Question" "Option 1" "Option 2"`
#[poise::command(prefix_command, guild_only)]
pub async fn poll(
    ctx: Context<'_>,
    #[description = "Poll question"] question: String,
    #[description = "Between 2 and 5 options"] options: Vec<String>,
) -> Result<(), Error> {
    if let Err(message) = validate_poll_options(&options) {
        ctx.say(message).await?;
        return Ok(());
    }

    let embed = serenity::CreateEmbed::new()
        .title(question)
        .description(poll_description(&options))
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Poll by {}",
            ctx.author().display_name()
        )))
        .color(COLOR_PURPLE);
    let reply = ctx.send(poise::CreateReply::default().embed(embed)).await?;
    let message = reply.message().await?;

    for emoji in POLL_EMOJIS.iter().take(options.len()) {
        message
            .react(
                ctx.serenity_context(),
                serenity::ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
    }
    Ok(())
}

fn validate_poll_options(options: &[String]) -> Result<(), &'static str> {
    if options.len() < 2 {
        return Err("Please provide between 2 and 5 options for the poll. Example: `!poll \"Your question\" \"Option 1\" \"Option 2\"`");
    }
    if options.len() > POLL_EMOJIS.len() {
        return Err("Polls can only have up to 5 options.");
    }
    Ok(())
}

fn poll_description(options: &[String]) -> String {
    POLL_EMOJIS
        .iter()
        .zip(options)
        .map(|(emoji, option)| format!("{} {}", emoji, option))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Show information about this server
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn serverinfo(ctx: Context<'_>) -> Result<(), Error> {
    let embed = {
        let Some(guild) = ctx.guild() else {
            return Err(crate::error::UserError::GuildOnly.into());
        };
        let mut embed = serenity::CreateEmbed::new()
            .title(format!("Server Info - {}", guild.name))
            .field("Members", guild.member_count.to_string(), true)
            .field("Roles", guild.roles.len().to_string(), true)
            .field(
                "Created",
                format!("<t:{}:D>", guild.id.created_at().unix_timestamp()),
                true,
            )
            .footer(serenity::CreateEmbedFooter::new(format!(
                "Server ID: {}",
                guild.id
            )))
            .color(COLOR_BLUE);
        if let Some(icon) = guild.icon_url() {
            embed = embed.thumbnail(icon);
        }
        embed
    };
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Change the command prefix for this server
#[poise::command(
    prefix_command,
    slash_command,
    aliases("prefix"),
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn setprefix(
    ctx: Context<'_>,
    #[description = "New prefix, up to 5 characters"] new_prefix: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or(crate::error::UserError::GuildOnly)?;

    let prefix = match validate_prefix(&new_prefix) {
        Ok(prefix) => prefix,
        Err(message) => {
            ctx.say(message).await?;
            return Ok(());
        }
    };

    if let Err(e) = ctx
        .data()
        .db
        .set_guild_prefix(guild_id.get(), Some(prefix))
        .await
    {
        error!("Failed to store prefix for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not update the prefix. Please try again later.").await;
    }

    info!("Prefix for guild {} set to {:?} by {}", guild_id, prefix, ctx.author().id);
    let embed = serenity::CreateEmbed::new()
        .title("Prefix Updated")
        .description(format!("Commands in this server now use `{}`.", prefix))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Go back to the default command prefix
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn resetprefix(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or(crate::error::UserError::GuildOnly)?;
    let db = &ctx.data().db;

    if let Err(e) = db.reset_guild_prefix(guild_id.get()).await {
        error!("Failed to reset prefix for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not reset the prefix. Please try again later.").await;
    }

    let embed = serenity::CreateEmbed::new()
        .title("Prefix Reset")
        .description(format!(
            "Commands in this server now use the default prefix `{}`.",
            db.default_prefix()
        ))
        .color(COLOR_GREEN);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Trims the requested prefix and checks it is usable.
fn validate_prefix(raw: &str) -> Result<&str, &'static str> {
    let prefix = raw.trim();
    if prefix.is_empty() {
        return Err("Please provide a non-empty prefix.");
    }
    if prefix.chars().count() > MAX_PREFIX_CHARS {
        return Err("Prefixes should be 5 characters or fewer.");
    }
    Ok(prefix)
}

pub(crate) async fn send_failure(ctx: Context<'_>, message: &str) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Error")
        .description(message)
        .color(COLOR_RED);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
