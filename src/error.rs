use poise::serenity_prelude::Permissions;
use thiserror::Error;

/// Problems caused by how a command was used. These are shown to the user
/// and are not logged as errors.
#[derive(Error, Debug)]
pub enum UserError {
    #[error("You are missing permissions: `{}`.", permission_names(.0))]
    MissingUserPermissions(Permissions),
    #[error("I need these permissions: `{}`.", permission_names(.0))]
    MissingBotPermissions(Permissions),
    #[error("This command can only be used in a server.")]
    GuildOnly,
    #[error("You don't have permission to run that command.")]
    CheckFailed,
    #[error("Couldn't understand `{0}`. Check the command usage and try again.")]
    BadArgs(String),
}

fn permission_names(permissions: &Permissions) -> String {
    permissions.get_permission_names().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_messages() {
        let missing = UserError::MissingUserPermissions(Permissions::KICK_MEMBERS).to_string();
        assert!(missing.starts_with("You are missing permissions: `"));
        assert!(missing.ends_with("`."));

        let bot = UserError::MissingBotPermissions(Permissions::BAN_MEMBERS).to_string();
        assert!(bot.starts_with("I need these permissions: `"));

        assert_eq!(
            UserError::GuildOnly.to_string(),
            "This command can only be used in a server."
        );
        assert_eq!(
            UserError::BadArgs("abc".to_string()).to_string(),
            "Couldn't understand `abc`. Check the command usage and try again."
        );
    }
}
