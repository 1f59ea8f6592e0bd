use chrono::Utc;
use perchbot::autosave::AutosaveTask;
use perchbot::config::Config;
use perchbot::db::Database;
use perchbot::{commands, events, logging, Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

async fn resolve_prefix(
    ctx: poise::PartialContext<'_, Data, Error>,
) -> Result<Option<String>, Error> {
    let guild_id = ctx.guild_id.map(|id| id.get());
    match ctx.data.db.get_prefix(guild_id).await {
        Ok(prefix) => Ok(Some(prefix)),
        Err(e) => {
            warn!("Falling back to default prefix for {:?}: {}", guild_id, e);
            Ok(Some(ctx.data.db.default_prefix().to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guards = logging::install_tracing(&config)?;
    info!("Loaded configuration: {:?}", config);

    let db = Database::new(
        config.database_path.clone(),
        config.prefix.clone(),
        config.settings_cache_capacity,
    );
    db.ensure_ready().await?;
    info!("Database ready at {}", db.path().display());

    let discord_token = config.discord_token.clone();
    let default_prefix = config.prefix.clone();
    let framework_db = db.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(default_prefix),
                dynamic_prefix: Some(|ctx| Box::pin(resolve_prefix(ctx))),
                mention_as_prefix: true,
                case_insensitive_commands: true,
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            post_command: |ctx| Box::pin(events::post_command(ctx)),
            on_error: |error| Box::pin(events::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                let commands = &framework.options().commands;
                match config.dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        info!("Registered slash commands in guild {}", guild_id);
                    }
                    None => {
                        poise::builtins::register_globally(ctx, commands).await?;
                        info!("Registered slash commands globally");
                    }
                }

                let autosave = AutosaveTask::new(framework_db.clone(), config.autosave_interval);
                tokio::spawn(autosave.run());

                Ok(Data {
                    config,
                    db: framework_db,
                    launch_time: Utc::now(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
