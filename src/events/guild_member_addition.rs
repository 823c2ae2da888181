use super::*;
use crate::monitor::gateway::Applicant;
use crate::monitor::listeners::on_member_join;

pub async fn guild_member_addition(
    ctx: &serenity::Context,
    new_member: &serenity::Member,
    data: &BotData,
) {
    let monitor = data.read().await.monitor.clone();

    on_member_join(
        &monitor,
        &DiscordGateway::from(ctx),
        new_member.guild_id,
        &Applicant::from(new_member),
    )
    .await;
}
