use crate::format::discord_timestamp;
use crate::services::points::{DailyOutcome, PointsService};
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::error;

use super::{COLOR_BLURPLE, COLOR_GOLD, COLOR_GREEN, COLOR_ORANGE, COLOR_RED};

/// Show your points, or another member's
#[poise::command(prefix_command, slash_command)]
pub async fn balance(
    ctx: Context<'_>,
    #[description = "Member to check"] member: Option<serenity::User>,
) -> Result<(), Error> {
    let target = member.as_ref().unwrap_or_else(|| ctx.author());
    let service = PointsService::new(ctx.data().db.clone());

    let balance = match service.balance(target.id.get()).await {
        Ok(balance) => balance,
        Err(e) => {
            error!("Failed to fetch balance for {}: {}", target.id, e);
            return send_error(ctx).await;
        }
    };

    let name = display_name(ctx, target).await;
    let embed = serenity::CreateEmbed::new()
        .title("Balance")
        .field(name, format!("Balance: **{}**", balance), false)
        .color(COLOR_BLURPLE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Claim your daily points
#[poise::command(prefix_command, slash_command)]
pub async fn daily(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let service = PointsService::new(ctx.data().db.clone());

    let outcome = match service.claim_daily(user_id, Utc::now()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Failed to apply daily reward for {}: {}", user_id, e);
            return send_error(ctx).await;
        }
    };

    let embed = match outcome {
        DailyOutcome::AlreadyClaimed { next_claim } => serenity::CreateEmbed::new()
            .title("Daily Reward")
            .description(format!(
                "You already claimed your reward today. Come back {}!",
                discord_timestamp(&next_claim, 'R')
            ))
            .color(COLOR_ORANGE),
        DailyOutcome::Claimed { reward, new_balance } => {
            let name = display_name(ctx, ctx.author()).await;
            serenity::CreateEmbed::new()
                .title("Daily Reward")
                .description(format!("You received {} points!", reward))
                .field(name, format!("New balance: **{}**", new_balance), false)
                .color(COLOR_GREEN)
        }
    };
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the top point holders
#[poise::command(prefix_command, slash_command)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let service = PointsService::new(ctx.data().db.clone());
    let top_users = match service.leaderboard().await {
        Ok(top) => top,
        Err(e) => {
            error!("Failed to fetch leaderboard: {}", e);
            return send_error(ctx).await;
        }
    };

    let mut entries = Vec::with_capacity(top_users.len());
    for (user_id, balance) in top_users {
        entries.push((resolve_display_name(ctx, user_id).await, balance));
    }

    let embed = serenity::CreateEmbed::new()
        .title("Leaderboard")
        .description(leaderboard_description(&entries))
        .color(COLOR_GOLD);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn leaderboard_description(entries: &[(String, i64)]) -> String {
    if entries.is_empty() {
        return "No one has any points yet.".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(i, (name, balance))| format!("{}. {} - {} points", i + 1, name, balance))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn send_error(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Error")
        .description("Error: Could not fetch data")
        .color(COLOR_RED);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Guild nickname when available, otherwise the user's own display name.
async fn display_name(ctx: Context<'_>, user: &serenity::User) -> String {
    if let Some(guild_id) = ctx.guild_id() {
        if let Some(nick) = user.nick_in(ctx.serenity_context(), guild_id).await {
            return nick;
        }
    }
    user.display_name().to_string()
}

/// Looks a user up in the guild member cache, then the user cache, then over HTTP.
async fn resolve_display_name(ctx: Context<'_>, user_id: u64) -> String {
    let user_id = serenity::UserId::new(user_id);

    let cached = ctx
        .guild()
        .and_then(|guild| {
            guild
                .members
                .get(&user_id)
                .map(|member| member.display_name().to_string())
        })
        .or_else(|| {
            ctx.cache()
                .user(user_id)
                .map(|user| user.display_name().to_string())
        });
    if let Some(name) = cached {
        return name;
    }

    match user_id.to_user(ctx.serenity_context()).await {
        Ok(user) => user.display_name().to_string(),
        Err(_) => format!("User {}", user_id),
    }
}
