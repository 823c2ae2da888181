use poise::serenity_prelude::{self as serenity, CreateEmbed, GuildId, Mentionable};
use poise::CreateReply;
use tracing::debug;

use crate::monitor::gateway::{Applicant, Messenger};
use crate::monitor::log::{LogEntry, LogLevel};
use crate::monitor::notifier::{notify, NotificationKind, NotifyError};
use crate::monitor::settings::SettingsPatch;
use crate::utils::bot::DiscordGateway;
use crate::{Context, Error};

const DEFAULT_LOG_COUNT: u8 = 10;

/// Leaves room for the code block around the listing.
const MAX_LISTING_LENGTH: usize = 1900;

fn guild_id(ctx: &Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| Error::from("This command can only be used in a server."))
}

/// Configure application monitoring.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands("channel", "role", "toggle", "settings", "debug", "reset", "test", "logs")
)]
pub async fn appmonitor(ctx: Context<'_>) -> Result<(), Error> {
    show_settings(ctx).await
}

/// Set the notification channel for application alerts.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "The channel to send alerts to, leave empty to clear"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();

    monitor
        .settings
        .update(guild, SettingsPatch {
            notification_channel: Some(channel.as_ref().map(|channel| channel.id)),
            ..Default::default()
        })
        .await?;

    let response = match channel {
        Some(channel) => format!("Notification channel set to {}", channel.mention()),
        None => "Notification channel has been cleared.".to_string(),
    };
    ctx.say(response).await?;

    Ok(())
}

/// Set the role to notify when applications are received.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn role(
    ctx: Context<'_>,
    #[description = "The role to mention, leave empty to clear"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();

    monitor
        .settings
        .update(guild, SettingsPatch {
            notification_role: Some(role.as_ref().map(|role| role.id)),
            ..Default::default()
        })
        .await?;

    let response = match role {
        Some(role) => format!("Notification role set to {}", role.mention()),
        None => "Notification role has been cleared.".to_string(),
    };
    ctx.say(response).await?;

    Ok(())
}

/// Enable or disable application monitoring.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn toggle(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();
    let gateway = DiscordGateway::from(ctx.serenity_context());

    let enabled = !monitor.settings.get(guild).await?.enabled;
    let settings = monitor.set_enabled(&gateway, guild, enabled).await?;

    debug!(
        "{} set application monitoring of {} to {}",
        ctx.author().name,
        guild,
        settings.enabled
    );

    let status = if settings.enabled { "enabled" } else { "disabled" };
    ctx.say(format!("Application monitoring has been {status}."))
        .await?;

    Ok(())
}

/// Show current application monitoring settings.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn settings(ctx: Context<'_>) -> Result<(), Error> {
    show_settings(ctx).await
}

async fn show_settings(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let (monitor, embed_color) = {
        let data = ctx.data().read().await;
        (data.monitor.clone(), data.configuration.general.embed_color)
    };
    let gateway = DiscordGateway::from(ctx.serenity_context());

    let settings = monitor.settings.get(guild).await?;

    let channel = match settings.notification_channel {
        Some(id) => {
            if gateway.has_channel(guild, id).await? {
                id.mention().to_string()
            } else {
                format!("{id} (missing)")
            }
        },
        None => "Not set".to_string(),
    };
    let role = match settings.notification_role {
        Some(id) => {
            if gateway.has_role(guild, id).await? {
                id.mention().to_string()
            } else {
                format!("{id} (missing)")
            }
        },
        None => "Not set".to_string(),
    };
    let tracked = monitor.tracker.tracked(guild).await;
    let guild_name = ctx
        .guild()
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| guild.to_string());

    let on_off = |flag: bool| if flag { "Enabled" } else { "Disabled" };

    ctx.send(CreateReply {
        embeds: vec![
            CreateEmbed::new()
                .title(format!("Application Monitor Settings for {guild_name}"))
                .field("Status", on_off(settings.enabled), true)
                .field("Notification Channel", channel, true)
                .field("Notification Role", role, true)
                .field("Debug Logging", on_off(settings.debug), true)
                .field("Tracked Applicants", tracked.to_string(), true)
                .color(embed_color),
        ],
        ..Default::default()
    })
    .await?;

    Ok(())
}

/// Toggle debug entries in the monitor log.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn debug(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();

    let enabled = !monitor.settings.get(guild).await?.debug;
    monitor
        .settings
        .update(guild, SettingsPatch {
            debug: Some(enabled),
            ..Default::default()
        })
        .await?;

    let status = if enabled { "enabled" } else { "disabled" };
    ctx.say(format!("Debug logging has been {status}.")).await?;

    Ok(())
}

/// Forget known applicants and start over from the current pending members.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();

    if !monitor.settings.get(guild).await?.enabled {
        ctx.say("Application monitoring is disabled, enable it first.")
            .await?;
        return Ok(());
    }

    let gateway = DiscordGateway::from(ctx.serenity_context());
    let seeded = monitor.reset(&gateway, guild).await?;

    ctx.say(format!(
        "Tracking has been reset. {seeded} pending member(s) will not be announced."
    ))
    .await?;

    Ok(())
}

/// Send a test notification about yourself.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn test(ctx: Context<'_>) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();
    let gateway = DiscordGateway::from(ctx.serenity_context());

    let applicant = match ctx.author_member().await {
        Some(member) => Applicant::from(&*member),
        None => return Err(Error::from("Could not fetch your member information.")),
    };
    let settings = monitor.settings.get(guild).await?;

    let outcome = notify(&gateway, guild, &settings, &applicant, NotificationKind::Test).await;
    let response = match outcome {
        Ok(()) => "Test notification sent.".to_string(),
        Err(NotifyError::ConfigInvalid(reason)) => {
            format!("Application monitor is not configured correctly: {reason}.")
        },
        Err(err) => {
            monitor.record(guild, LogLevel::Error, err.to_string());
            format!("Could not send the test notification: {err}.")
        },
    };
    ctx.say(response).await?;

    Ok(())
}

/// Show recent monitor log entries.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn logs(
    ctx: Context<'_>,
    #[description = "Number of entries to show"]
    #[min = 1]
    #[max = 50]
    count: Option<u8>,
) -> Result<(), Error> {
    let guild = guild_id(&ctx)?;
    let monitor = ctx.data().read().await.monitor.clone();

    let entries = monitor
        .log
        .recent(guild, usize::from(count.unwrap_or(DEFAULT_LOG_COUNT)));

    if entries.is_empty() {
        ctx.say("No log entries yet.").await?;
    } else {
        ctx.say(format!("```\n{}\n```", listing(&entries))).await?;
    }

    Ok(())
}

/// Joins entries one per line, dropping the oldest until the listing fits
/// into a single message.
fn listing(entries: &[LogEntry]) -> String {
    let mut lines: Vec<String> = entries.iter().map(ToString::to_string).collect();

    let mut length: usize = lines.iter().map(|line| line.len() + 1).sum();
    while lines.len() > 1 && length > MAX_LISTING_LENGTH {
        length -= lines.remove(0).len() + 1;
    }

    let mut listing = lines.join("\n");
    if listing.len() > MAX_LISTING_LENGTH {
        let mut end = MAX_LISTING_LENGTH;
        while !listing.is_char_boundary(end) {
            end -= 1;
        }
        listing.truncate(end);
    }
    listing
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(message: String) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message,
        }
    }

    #[test]
    fn listing_keeps_newest_entries_within_limit() {
        let entries: Vec<_> = (0..100)
            .map(|i| entry(format!("{i:03} {}", "x".repeat(60))))
            .collect();

        let listing = listing(&entries);

        assert!(listing.len() <= MAX_LISTING_LENGTH);
        assert!(listing.ends_with(&format!("099 {}", "x".repeat(60))));
        assert!(!listing.contains("000 "));
    }

    #[test]
    fn oversized_single_entry_is_truncated() {
        let listing = listing(&[entry("é".repeat(MAX_LISTING_LENGTH))]);

        assert!(listing.len() <= MAX_LISTING_LENGTH);
    }
}
