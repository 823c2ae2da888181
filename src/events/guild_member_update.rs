use super::*;
use crate::monitor::gateway::Applicant;
use crate::monitor::listeners::on_member_update;

pub async fn guild_member_update(
    ctx: &serenity::Context,
    old_if_available: &Option<serenity::Member>,
    new: &Option<serenity::Member>,
    event: &serenity::GuildMemberUpdateEvent,
    data: &BotData,
) {
    let monitor = data.read().await.monitor.clone();

    // The event carries the pending flag even when the member is not cached.
    let new = new
        .as_ref()
        .map(Applicant::from)
        .unwrap_or_else(|| Applicant::from(event));
    let old = old_if_available.as_ref().map(Applicant::from);

    on_member_update(
        &monitor,
        &DiscordGateway::from(ctx),
        event.guild_id,
        old.as_ref(),
        &new,
    )
    .await;
}
