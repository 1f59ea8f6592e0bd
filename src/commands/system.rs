use crate::format::discord_timestamp;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::error;

use super::general::send_failure;
use super::COLOR_BLURPLE;

/// Show when the scheduled save last ran
#[poise::command(prefix_command, slash_command)]
pub async fn lastsave(ctx: Context<'_>) -> Result<(), Error> {
    let last_save = match ctx.data().db.get_last_save().await {
        Ok(last_save) => last_save,
        Err(e) => {
            error!("Failed to read last save time: {}", e);
            return send_failure(ctx, "Could not read the last save time.").await;
        }
    };

    let description = match last_save {
        Some(at) => format!(
            "Last save: {} ({})",
            discord_timestamp(&at, 'F'),
            discord_timestamp(&at, 'R')
        ),
        None => "The scheduled save has not run yet.".to_string(),
    };
    let embed = serenity::CreateEmbed::new()
        .title("Last Save")
        .description(description)
        .color(COLOR_BLURPLE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
