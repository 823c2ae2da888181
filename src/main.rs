use std::env;
use std::sync::Arc;

use commands::{appmonitor, configuration};
use db::database::Database;
use model::application::Configuration;
use monitor::reconcile::Reconciler;
use monitor::ApplicationMonitor;
use poise::serenity_prelude::{self as serenity, GatewayIntents};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utils::bot::DiscordGateway;

mod commands;
mod db;
mod events;
mod logger;
mod model;
mod monitor;
mod utils;

// Types used by all command functions
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, BotData, Error>;

// Data shared across commands and events
pub type BotData = Arc<RwLock<Data>>;

pub struct Data {
    pub configuration: Configuration,
    pub monitor: Arc<ApplicationMonitor>,
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command {}: {}", ctx.command().qualified_name, error);

            if let Err(err) = ctx.say(error.to_string()).await {
                error!("Failed to report command error: {}", err);
            }
        },
        error => {
            if let Err(err) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", err);
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    logger::init()?;

    // Load configuration
    let configuration = Configuration::load()?;

    let token = env::var("DISCORD_AUTHORIZATION_TOKEN")
        .map_err(|_| "Environment variable DISCORD_AUTHORIZATION_TOKEN is not set")?;
    let mongodb_uri =
        env::var("MONGODB_URI").map_err(|_| "Environment variable MONGODB_URI is not set")?;

    let database = Database::new(&mongodb_uri, &configuration.database.name).await?;
    let monitor = Arc::new(ApplicationMonitor::new(
        Arc::new(database),
        configuration.monitor.log_capacity,
    ));

    let poll_interval = configuration.monitor.poll_interval();
    let prefix = configuration.general.prefix.clone();

    let data = Arc::new(RwLock::new(Data {
        configuration,
        monitor: monitor.clone(),
    }));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                configuration::reload(),
                configuration::stop(),
                configuration::register(),
                appmonitor::appmonitor(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |_ctx, _ready, _framework| Box::pin(async move { Ok(data) }))
        .build();

    let mut client = serenity::ClientBuilder::new(
        token,
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT,
    )
    .framework(framework)
    .await?;

    let gateway = Arc::new(DiscordGateway::new(
        client.cache.clone(),
        client.http.clone(),
    ));
    let shutdown = CancellationToken::new();
    let reconciler = tokio::spawn(
        Reconciler::new(monitor, gateway, poll_interval).run(shutdown.clone()),
    );

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    let result = client.start().await;

    shutdown.cancel();
    if let Err(err) = reconciler.await {
        error!("Reconciliation loop panicked: {}", err);
    }

    result?;
    Ok(())
}
