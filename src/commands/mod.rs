pub mod fun;
pub mod general;
pub mod moderation;
pub mod points;
pub mod system;
pub mod utility;

use crate::{Data, Error};

pub(crate) const COLOR_BLURPLE: u32 = 0x5865F2;
pub(crate) const COLOR_BLUE: u32 = 0x3498DB;
pub(crate) const COLOR_DARK_BLUE: u32 = 0x206694;
pub(crate) const COLOR_DARK_TEAL: u32 = 0x11806A;
pub(crate) const COLOR_GOLD: u32 = 0xF1C40F;
pub(crate) const COLOR_GREEN: u32 = 0x57F287;
pub(crate) const COLOR_ORANGE: u32 = 0xE67E22;
pub(crate) const COLOR_PURPLE: u32 = 0x9B59B6;
pub(crate) const COLOR_RED: u32 = 0xED4245;
pub(crate) const COLOR_YELLOW: u32 = 0xFEE75C;

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        general::hello(),
        general::poll(),
        general::serverinfo(),
        general::setprefix(),
        general::resetprefix(),
        points::balance(),
        points::daily(),
        points::leaderboard(),
        moderation::setmodrole(),
        moderation::setadminrole(),
        moderation::setwelcome(),
        moderation::resetconfig(),
        moderation::kick(),
        moderation::ban(),
        moderation::unban(),
        utility::ping(),
        utility::uptime(),
        fun::roll(),
        fun::eight_ball(),
        system::lastsave(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_command_names_are_unique() {
        let commands = all();
        let names: HashSet<_> = commands.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names.len(), commands.len());
        assert!(names.contains("8ball"));
        assert!(names.contains("leaderboard"));
    }
}
