use crate::format::format_uptime;
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::{COLOR_BLURPLE, COLOR_GREEN, COLOR_RED, COLOR_YELLOW};

/// Show the gateway latency
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let latency_ms = ctx.ping().await.as_millis();
    let embed = serenity::CreateEmbed::new()
        .title("Pong!")
        .description(format!("Latency: **{}ms**", latency_ms))
        .color(latency_color(latency_ms));
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show how long the bot has been running
#[poise::command(prefix_command, slash_command)]
pub async fn uptime(ctx: Context<'_>) -> Result<(), Error> {
    let launched = ctx.data().launch_time;
    let elapsed = (Utc::now() - launched).to_std().unwrap_or_default();
    let embed = serenity::CreateEmbed::new()
        .title("Uptime")
        .description(format!("I've been online for **{}**.", format_uptime(elapsed)))
        .field("Since", format!("<t:{}:F>", launched.timestamp()), false)
        .color(COLOR_BLURPLE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn latency_color(latency_ms: u128) -> u32 {
    match latency_ms {
        0..=99 => COLOR_GREEN,
        100..=299 => COLOR_YELLOW,
        _ => COLOR_RED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_color() {
        assert_eq!(latency_color(0), COLOR_GREEN);
        assert_eq!(latency_color(99), COLOR_GREEN);
        assert_eq!(latency_color(100), COLOR_YELLOW);
        assert_eq!(latency_color(299), COLOR_YELLOW);
        assert_eq!(latency_color(300), COLOR_RED);
    }
}
