use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::{COLOR_DARK_BLUE, COLOR_PURPLE};

const EIGHT_BALL_RESPONSES: [&str; 20] = [
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes - definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

/// Roll a die (6 sides unless you say otherwise)
#[poise::command(prefix_command, slash_command)]
pub async fn roll(
    ctx: Context<'_>,
    #[description = "Number of sides"]
    #[min = 2]
    sides: Option<u32>,
) -> Result<(), Error> {
    let sides = sides.unwrap_or(6);
    if sides < 2 {
        ctx.say("A die needs at least 2 sides.").await?;
        return Ok(());
    }

    let result = rand::rng().random_range(1..=sides);
    let embed = serenity::CreateEmbed::new()
        .title("Dice Roll")
        .description(format!("You rolled a **{}** (1-{}).", result, sides))
        .color(COLOR_DARK_BLUE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Ask the magic 8-ball a question
#[poise::command(prefix_command, slash_command, rename = "8ball")]
pub async fn eight_ball(
    ctx: Context<'_>,
    #[description = "Your question"]
    #[rest]
    question: String,
) -> Result<(), Error> {
    let answer = EIGHT_BALL_RESPONSES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("Ask again later.");
    let embed = serenity::CreateEmbed::new()
        .title("Magic 8-Ball")
        .field("Question", question, false)
        .field("Answer", answer, false)
        .color(COLOR_PURPLE);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
