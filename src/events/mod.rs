use poise::serenity_prelude as serenity;

use crate::utils::bot::DiscordGateway;
use crate::{BotData, Error};

mod guild_member_addition;
mod guild_member_update;
mod ready;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            ready::ready(data_about_bot, data).await;
        },
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            guild_member_addition::guild_member_addition(ctx, new_member, data).await
        },
        serenity::FullEvent::GuildMemberUpdate {
            old_if_available,
            new,
            event,
        } => guild_member_update::guild_member_update(ctx, old_if_available, new, event, data).await,
        _ => {},
    }
    Ok(())
}
