use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use poise::CreateReply;
use tracing::{debug, info};

use crate::model::application::Configuration;
use crate::{Context, Error};

async fn reply_ephemeral(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(CreateReply {
        embeds: vec![embed],
        ephemeral: Some(true),
        ..Default::default()
    })
    .await?;

    Ok(())
}

/// Reload configuration.json.
#[poise::command(slash_command, owners_only)]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    let reloaded = Configuration::load()?;

    let embed = {
        let mut data = ctx.data().write().await;

        let mut embed = CreateEmbed::new()
            .description("Configuration reloaded.")
            .field("Prefix", &reloaded.general.prefix, true)
            .field(
                "Poll Interval",
                format!("{}s", reloaded.monitor.poll_interval().as_secs()),
                true,
            )
            .color(reloaded.general.embed_color);
        if data.configuration.restart_required(&reloaded) {
            embed = embed.footer(CreateEmbedFooter::new(
                "Prefix, poll interval and log capacity changes apply after a restart.",
            ));
        }

        data.configuration = reloaded;
        embed
    };

    debug!("{} reloaded the configuration", ctx.author().name);
    reply_ephemeral(ctx, embed).await
}

/// Shut the bot down. Reconciliation stops with the gateway.
#[poise::command(slash_command, owners_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    info!("{} requested shutdown", ctx.author().name);

    let color = ctx.data().read().await.configuration.general.embed_color;
    reply_ephemeral(
        ctx,
        CreateEmbed::new()
            .description("Stopping application monitoring and disconnecting.")
            .color(color),
    )
    .await?;

    ctx.framework().shard_manager().shutdown_all().await;

    Ok(())
}

/// Register or unregister the application commands.
#[poise::command(prefix_command, slash_command, owners_only, ephemeral = true)]
pub async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}
