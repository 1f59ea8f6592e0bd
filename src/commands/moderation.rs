use crate::error::UserError;
use crate::format::truncate_message;
use crate::{Context, Error};
use ::serenity::http::UserPagination;
use ::serenity::model::ModelError;
use poise::serenity_prelude as serenity;
use std::future::Future;
use tracing::{error, info, warn};

use super::general::send_failure;
use super::{COLOR_DARK_TEAL, COLOR_GREEN, COLOR_ORANGE, COLOR_RED};

/// Discord rejects audit log reasons longer than this.
const MAX_AUDIT_REASON: usize = 512;

/// Set the role allowed to kick members, or clear it
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn setmodrole(
    ctx: Context<'_>,
    #[description = "Moderator role (leave empty to clear)"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;
    let role_id = role.as_ref().map(|r| r.id.get());

    if let Err(e) = ctx.data().db.set_moderator_role(guild_id.get(), role_id).await {
        error!("Failed to store moderator role for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not update the moderator role.").await;
    }

    let description = match &role {
        Some(role) => format!("Moderator role set to <@&{}>.", role.id),
        None => "Moderator role cleared.".to_string(),
    };
    send_config_embed(ctx, "Moderator Role", description).await
}

/// Set the role allowed to ban members, or clear it
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn setadminrole(
    ctx: Context<'_>,
    #[description = "Admin role (leave empty to clear)"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;
    let role_id = role.as_ref().map(|r| r.id.get());

    if let Err(e) = ctx.data().db.set_admin_role(guild_id.get(), role_id).await {
        error!("Failed to store admin role for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not update the admin role.").await;
    }

    let description = match &role {
        Some(role) => format!("Admin role set to <@&{}>.", role.id),
        None => "Admin role cleared.".to_string(),
    };
    send_config_embed(ctx, "Admin Role", description).await
}

/// Set the channel that greets new members, or clear it
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn setwelcome(
    ctx: Context<'_>,
    #[description = "Welcome channel (leave empty to clear)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;
    let channel_id = channel.as_ref().map(|c| c.id.get());

    if let Err(e) = ctx
        .data()
        .db
        .set_welcome_channel(guild_id.get(), channel_id)
        .await
    {
        error!("Failed to store welcome channel for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not update the welcome channel.").await;
    }

    let description = match &channel {
        Some(channel) => format!("New members will be welcomed in <#{}>.", channel.id),
        None => "Welcome messages are turned off.".to_string(),
    };
    send_config_embed(ctx, "Welcome Channel", description).await
}

/// Forget every setting stored for this server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn resetconfig(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;

    if let Err(e) = ctx.data().db.clear_guild_settings(guild_id.get()).await {
        error!("Failed to clear settings for guild {}: {}", guild_id, e);
        return send_failure(ctx, "Could not reset the server configuration.").await;
    }

    info!(target: "moderation", action = "resetconfig", guild = %guild_id, moderator = %ctx.author().id, "Guild settings cleared");
    send_config_embed(
        ctx,
        "Configuration Reset",
        "All settings for this server were reset to defaults.".to_string(),
    )
    .await
}

/// Kick a member from the server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    required_bot_permissions = "KICK_MEMBERS"
)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    if let Err(message) = authorise(ctx, &member, RequiredRole::Moderator).await? {
        ctx.say(message).await?;
        return Ok(());
    }

    let reason = audit_reason(reason.as_deref());
    let kicked = match &reason {
        Some(reason) => member.kick_with_reason(ctx.serenity_context(), reason).await,
        None => member.kick(ctx.serenity_context()).await,
    };
    if let Err(e) = kicked {
        return report_failure(ctx, "kick", "that member", &e).await;
    }

    log_action(ctx, "kick", &member.user, reason.as_deref());
    send_action_embed(ctx, "Member Kicked", &member.user, reason.as_deref(), COLOR_ORANGE).await
}

/// Ban a member from the server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    required_bot_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    if let Err(message) = authorise(ctx, &member, RequiredRole::Admin).await? {
        ctx.say(message).await?;
        return Ok(());
    }

    let reason = audit_reason(reason.as_deref());
    let banned = match &reason {
        Some(reason) => {
            member
                .ban_with_reason(ctx.serenity_context(), 0, reason)
                .await
        }
        None => member.ban(ctx.serenity_context(), 0).await,
    };
    if let Err(e) = banned {
        return report_failure(ctx, "ban", "that member", &e).await;
    }

    log_action(ctx, "ban", &member.user, reason.as_deref());
    send_action_embed(ctx, "Member Banned", &member.user, reason.as_deref(), COLOR_RED).await
}

/// Lift a ban by user id, username, or name#1234
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    required_bot_permissions = "BAN_MEMBERS"
)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User id, username, or name#1234"]
    #[rest]
    tag: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;
    let Some(target) = BanTarget::parse(&tag) else {
        return Err(UserError::BadArgs(tag).into());
    };

    if !has_required_role(ctx, RequiredRole::Admin).await? {
        ctx.say(RequiredRole::Admin.denied_message()).await?;
        return Ok(());
    }

    let http = ctx.http();
    let found = find_in_pages(
        |after: Option<u64>| async move {
            let page = guild_id
                .bans(
                    http,
                    after.map(|id| UserPagination::After(serenity::UserId::new(id))),
                    None,
                )
                .await?;
            Ok::<_, ::serenity::Error>(page.into_iter().map(|ban| ban.user).collect::<Vec<_>>())
        },
        |user: &serenity::User| user.id.get(),
        |user: &serenity::User| {
            target.matches(user.id.get(), &user.name, user.discriminator.map(|d| d.get()))
        },
    )
    .await;
    let found = match found {
        Ok(Some(user)) => user,
        Ok(None) => {
            ctx.say(format!("No banned user matches `{}`.", tag)).await?;
            return Ok(());
        }
        Err(e) if is_permission_error(&e) => {
            warn!("Missing permission to read bans in guild {}: {}", guild_id, e);
            ctx.say("I don't have permission to view bans.").await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to fetch bans for guild {}: {}", guild_id, e);
            ctx.say("Failed to fetch the ban list. Please try again later.")
                .await?;
            return Ok(());
        }
    };

    if let Err(e) = guild_id.unban(http, found.id).await {
        return report_failure(ctx, "unban", "that user", &e).await;
    }
    log_action(ctx, "unban", &found, None);
    send_action_embed(ctx, "Member Unbanned", &found, None, COLOR_GREEN).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequiredRole {
    Moderator,
    Admin,
}

impl RequiredRole {
    fn denied_message(self) -> &'static str {
        match self {
            RequiredRole::Moderator => "You need the moderator role to use this command.",
            RequiredRole::Admin => "You need the admin role to use this command.",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RoleGate {
    Allowed,
    /// The configured role was deleted from the guild.
    Stale,
    Denied,
}

/// The guild owner gets no exemption here; ownership only skips the hierarchy check.
fn role_gate(configured: Option<u64>, role_exists: bool, author_has_role: bool) -> RoleGate {
    match configured {
        None => RoleGate::Allowed,
        Some(_) if !role_exists => RoleGate::Stale,
        Some(_) if author_has_role => RoleGate::Allowed,
        Some(_) => RoleGate::Denied,
    }
}

/// Clears a stale role setting. Returns whether the author may proceed.
async fn resolve_gate(ctx: Context<'_>, gate: RoleGate, required: RequiredRole) -> bool {
    match gate {
        RoleGate::Allowed => true,
        RoleGate::Denied => false,
        RoleGate::Stale => {
            let Some(guild_id) = ctx.guild_id() else {
                return false;
            };
            let db = &ctx.data().db;
            let cleared = match required {
                RequiredRole::Moderator => db.set_moderator_role(guild_id.get(), None).await,
                RequiredRole::Admin => db.set_admin_role(guild_id.get(), None).await,
            };
            match cleared {
                Ok(_) => warn!("Cleared deleted {:?} role setting for guild {}", required, guild_id),
                Err(e) => error!("Failed to clear stale role for guild {}: {}", guild_id, e),
            }
            true
        }
    }
}

/// Checks the author against the configured role for `required`. A role that
/// was deleted from the guild is cleared and the author is let through.
async fn has_required_role(ctx: Context<'_>, required: RequiredRole) -> Result<bool, Error> {
    let guild_id = ctx.guild_id().ok_or(UserError::GuildOnly)?;
    let db = &ctx.data().db;
    let role_id = match required {
        RequiredRole::Moderator => db.get_moderator_role_id(guild_id.get()).await?,
        RequiredRole::Admin => db.get_admin_role_id(guild_id.get()).await?,
    };
    let Some(role_id) = role_id.map(serenity::RoleId::new) else {
        return Ok(true);
    };

    let author = ctx.author_member().await.ok_or(UserError::GuildOnly)?;
    let role_exists = {
        let guild = ctx.guild().ok_or(UserError::GuildOnly)?;
        guild.roles.contains_key(&role_id)
    };
    let gate = role_gate(Some(role_id.get()), role_exists, author.roles.contains(&role_id));
    Ok(resolve_gate(ctx, gate, required).await)
}

/// Runs the role and hierarchy checks for acting on `target`.
/// The outer error is a store or Discord failure, the inner one a refusal to show the author.
async fn authorise(
    ctx: Context<'_>,
    target: &serenity::Member,
    required: RequiredRole,
) -> Result<Result<(), &'static str>, Error> {
    if !has_required_role(ctx, required).await? {
        return Ok(Err(required.denied_message()));
    }

    let author = ctx.author_member().await.ok_or(UserError::GuildOnly)?;
    let (owner_id, author_top, target_top) = {
        let guild = ctx.guild().ok_or(UserError::GuildOnly)?;
        (
            guild.owner_id,
            top_role_position(&guild, &author.roles),
            top_role_position(&guild, &target.roles),
        )
    };

    Ok(check_target(
        author.user.id.get(),
        target.user.id.get(),
        owner_id.get(),
        owner_id == author.user.id,
        author_top,
        target_top,
    ))
}

fn top_role_position(guild: &serenity::Guild, roles: &[serenity::RoleId]) -> u16 {
    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

fn check_target(
    author_id: u64,
    target_id: u64,
    owner_id: u64,
    author_is_owner: bool,
    author_top: u16,
    target_top: u16,
) -> Result<(), &'static str> {
    if author_id == target_id {
        return Err("You can't use this on yourself.");
    }
    if target_id == owner_id {
        return Err("You can't use this on the server owner.");
    }
    if !author_is_owner && target_top >= author_top {
        return Err("You can't act on a member whose top role is equal to or higher than yours.");
    }
    Ok(())
}

/// Trims the reason and caps it at the audit log limit. Blank reasons become `None`.
fn audit_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| truncate_message(r, MAX_AUDIT_REASON, "..."))
}

/// Walks a cursor-paginated listing until `is_match` hits or a page comes back
/// empty. `cursor` gives the id to continue after.
async fn find_in_pages<T, F, Fut, E>(
    mut fetch_page: F,
    cursor: impl Fn(&T) -> u64,
    mut is_match: impl FnMut(&T) -> bool,
) -> Result<Option<T>, E>
where
    F: FnMut(Option<u64>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut after = None;
    loop {
        let page = fetch_page(after).await?;
        let Some(last) = page.last().map(&cursor) else {
            return Ok(None);
        };
        if let Some(found) = page.into_iter().find(|item| is_match(item)) {
            return Ok(Some(found));
        }
        if after == Some(last) {
            return Ok(None);
        }
        after = Some(last);
    }
}

/// Discord refused the action, or the cache already knows we can't do it.
fn is_permission_error(err: &::serenity::Error) -> bool {
    match err {
        ::serenity::Error::Http(::serenity::http::HttpError::UnsuccessfulRequest(response)) => {
            response.status_code.as_u16() == 403
        }
        ::serenity::Error::Model(
            ModelError::InvalidPermissions { .. } | ModelError::Hierarchy,
        ) => true,
        _ => false,
    }
}

fn failure_message(verb: &str, object: &str, err: &::serenity::Error) -> String {
    if is_permission_error(err) {
        format!("I don't have permission to {} {}.", verb, object)
    } else {
        format!("Failed to {} {}. Please try again later.", verb, object)
    }
}

async fn report_failure(
    ctx: Context<'_>,
    verb: &str,
    object: &str,
    err: &::serenity::Error,
) -> Result<(), Error> {
    if is_permission_error(err) {
        warn!(target: "moderation", action = verb, guild = ?ctx.guild_id(), "Refused by Discord: {}", err);
    } else {
        error!(target: "moderation", action = verb, guild = ?ctx.guild_id(), "Discord request failed: {}", err);
    }
    ctx.say(failure_message(verb, object, err)).await?;
    Ok(())
}

/// Who an `unban` is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BanTarget {
    Id(u64),
    Name {
        name: String,
        discriminator: Option<u16>,
    },
}

impl BanTarget {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let unwrapped = raw
            .strip_prefix("<@")
            .and_then(|s| s.strip_suffix('>'))
            .map(|s| s.trim_start_matches('!'))
            .unwrap_or(raw);
        if let Ok(id) = unwrapped.parse::<u64>() {
            return Some(BanTarget::Id(id));
        }

        if let Some((name, disc)) = raw.rsplit_once('#') {
            if let Ok(discriminator) = disc.parse::<u16>() {
                if !name.is_empty() {
                    return Some(BanTarget::Name {
                        name: name.to_string(),
                        discriminator: Some(discriminator),
                    });
                }
            }
        }

        Some(BanTarget::Name {
            name: raw.to_string(),
            discriminator: None,
        })
    }

    fn matches(&self, user_id: u64, name: &str, discriminator: Option<u16>) -> bool {
        match self {
            BanTarget::Id(id) => *id == user_id,
            BanTarget::Name {
                name: wanted,
                discriminator: wanted_disc,
            } => {
                wanted.eq_ignore_ascii_case(name)
                    && (wanted_disc.is_none() || *wanted_disc == discriminator)
            }
        }
    }
}

fn log_action(ctx: Context<'_>, action: &str, target: &serenity::User, reason: Option<&str>) {
    info!(
        target: "moderation",
        action,
        guild = ?ctx.guild_id(),
        moderator = %ctx.author().id,
        target_user = %target.id,
        reason = reason.unwrap_or("none"),
        "{} {} ({})",
        action,
        target.name,
        target.id
    );
}

async fn send_action_embed(
    ctx: Context<'_>,
    title: &str,
    user: &serenity::User,
    reason: Option<&str>,
    color: u32,
) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .field("User", format!("{} ({})", user.name, user.id), false)
        .field("Moderator", ctx.author().name.clone(), true)
        .field("Reason", reason.unwrap_or("No reason provided"), true)
        .color(color);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn send_config_embed(ctx: Context<'_>, title: &str, description: String) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(COLOR_DARK_TEAL);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gate() {
        assert_eq!(role_gate(None, false, false), RoleGate::Allowed);
        assert_eq!(role_gate(Some(1), false, false), RoleGate::Stale);
        assert_eq!(role_gate(Some(1), true, true), RoleGate::Allowed);
        // Owning the guild does not stand in for the configured role
        assert_eq!(role_gate(Some(1), true, false), RoleGate::Denied);
    }

    #[test]
    fn test_check_target() {
        // Self
        assert!(check_target(1, 1, 9, false, 5, 0).is_err());
        // Owner is untouchable
        assert!(check_target(1, 9, 9, false, 10, 0).is_err());
        // Hierarchy
        assert!(check_target(1, 2, 9, false, 5, 5).is_err());
        assert!(check_target(1, 2, 9, false, 5, 7).is_err());
        assert!(check_target(1, 2, 9, false, 5, 3).is_ok());
        // The owner skips the hierarchy check
        assert!(check_target(9, 2, 9, true, 0, 7).is_ok());
    }

    #[test]
    fn test_audit_reason() {
        assert_eq!(audit_reason(None), None);
        assert_eq!(audit_reason(Some("   ")), None);
        assert_eq!(audit_reason(Some(" spam ")), Some("spam".to_string()));

        let long = "x".repeat(600);
        let capped = audit_reason(Some(&long)).unwrap();
        assert_eq!(capped.chars().count(), MAX_AUDIT_REASON);
        assert!(capped.ends_with("..."));
    }

    #[test]
    fn test_ban_target_parse() {
        assert_eq!(BanTarget::parse("  "), None);
        assert_eq!(
            BanTarget::parse("123456789012345678"),
            Some(BanTarget::Id(123456789012345678))
        );
        assert_eq!(BanTarget::parse("<@!42>"), Some(BanTarget::Id(42)));
        assert_eq!(BanTarget::parse("<@42>"), Some(BanTarget::Id(42)));
        assert_eq!(
            BanTarget::parse("spammer#0420"),
            Some(BanTarget::Name {
                name: "spammer".to_string(),
                discriminator: Some(420)
            })
        );
        assert_eq!(
            BanTarget::parse("new.style"),
            Some(BanTarget::Name {
                name: "new.style".to_string(),
                discriminator: None
            })
        );
    }

    #[test]
    fn test_failure_messages() {
        let refused = ::serenity::Error::Model(ModelError::Hierarchy);
        assert!(is_permission_error(&refused));
        assert_eq!(
            failure_message("kick", "that member", &refused),
            "I don't have permission to kick that member."
        );

        let other = ::serenity::Error::Other("connection reset");
        assert!(!is_permission_error(&other));
        assert_eq!(
            failure_message("ban", "that member", &other),
            "Failed to ban that member. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_find_in_pages_follows_cursor() {
        // Three pages of ids, then an empty page
        let pages: Vec<Vec<u64>> = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8], vec![]];
        let requested = std::sync::Mutex::new(Vec::new());

        let fetch = |after: Option<u64>| {
            requested.lock().unwrap().push(after);
            let page = match after {
                None => pages[0].clone(),
                Some(3) => pages[1].clone(),
                Some(6) => pages[2].clone(),
                _ => pages[3].clone(),
            };
            async move { Ok::<_, ()>(page) }
        };

        let found = find_in_pages(fetch, |id: &u64| *id, |id: &u64| *id == 7).await.unwrap();
        assert_eq!(found, Some(7));
        assert_eq!(*requested.lock().unwrap(), vec![None, Some(3), Some(6)]);

        let missing = find_in_pages(
            |after: Option<u64>| {
                let page = match after {
                    None => vec![1, 2],
                    Some(2) => vec![3],
                    _ => vec![],
                };
                async move { Ok::<_, ()>(page) }
            },
            |id: &u64| *id,
            |id: &u64| *id == 99,
        )
        .await
        .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_find_in_pages_stops_on_error() {
        let result = find_in_pages(
            |_after: Option<u64>| async { Err::<Vec<u64>, _>("boom") },
            |id: &u64| *id,
            |_: &u64| true,
        )
        .await;
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_ban_target_matches() {
        assert!(BanTarget::Id(7).matches(7, "anyone", None));
        assert!(!BanTarget::Id(7).matches(8, "anyone", None));

        let legacy = BanTarget::parse("Spammer#0420").unwrap();
        assert!(legacy.matches(1, "spammer", Some(420)));
        assert!(!legacy.matches(1, "spammer", Some(421)));
        assert!(!legacy.matches(1, "spammer", None));

        let plain = BanTarget::parse("spammer").unwrap();
        assert!(plain.matches(1, "spammer", None));
        assert!(plain.matches(1, "spammer", Some(420)));
        assert!(!plain.matches(1, "someone", None));
    }
}
