use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity,
    Cache,
    ChannelId,
    CreateAllowedMentions,
    CreateEmbed,
    CreateMessage,
    GuildId,
    Http,
    RoleId,
    Timestamp,
    UserId,
};

use crate::monitor::gateway::{Applicant, DeliveryError, MemberSource, Messenger, Notice};
use crate::Error;

/// Discord caps member list pages at this size.
const MEMBER_PAGE_LIMIT: u64 = 1000;

const SCREENING_FEATURE: &str = "MEMBER_VERIFICATION_GATE_ENABLED";

/// Only the membership gate holds new members as pending. A rules channel
/// alone does not.
fn has_screening_gate(features: &[String]) -> bool {
    features.iter().any(|feature| feature == SCREENING_FEATURE)
}

fn status_code(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(err) => err.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

pub async fn get_member(
    cache_http: impl serenity::CacheHttp,
    guild_id: GuildId,
    user_id: UserId,
) -> serenity::Result<Option<serenity::Member>> {
    match guild_id.member(cache_http, user_id).await {
        Ok(member) => Ok(Some(member)),
        Err(err) if status_code(&err) == Some(404) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Serenity's cache and HTTP client behind the monitor's gateway traits.
#[derive(Clone)]
pub struct DiscordGateway {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(cache: Arc<Cache>, http: Arc<Http>) -> Self {
        DiscordGateway { cache, http }
    }

    fn cache_http(&self) -> (&Arc<Cache>, &Http) {
        (&self.cache, &self.http)
    }
}

impl From<&serenity::Context> for DiscordGateway {
    fn from(ctx: &serenity::Context) -> Self {
        DiscordGateway::new(ctx.cache.clone(), ctx.http.clone())
    }
}

#[async_trait]
impl MemberSource for DiscordGateway {
    async fn guilds(&self) -> Result<Vec<GuildId>, Error> {
        Ok(self.cache.guilds())
    }

    async fn pending_members(&self, guild: GuildId) -> Result<Vec<UserId>, Error> {
        let mut pending = Vec::new();
        let mut after: Option<UserId> = None;

        loop {
            let page = guild
                .members(&self.http, Some(MEMBER_PAGE_LIMIT), after)
                .await?;

            pending.extend(
                page.iter()
                    .filter(|member| member.pending)
                    .map(|member| member.user.id),
            );

            if (page.len() as u64) < MEMBER_PAGE_LIMIT {
                break;
            }
            after = page.last().map(|member| member.user.id);
        }

        Ok(pending)
    }

    async fn member(&self, guild: GuildId, member: UserId) -> Result<Option<Applicant>, Error> {
        let member = get_member(self.cache_http(), guild, member).await?;
        Ok(member.as_ref().map(Applicant::from))
    }

    async fn screening_enabled(&self, guild: GuildId) -> bool {
        self.cache
            .guild(guild)
            .map(|guild| has_screening_gate(&guild.features))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Messenger for DiscordGateway {
    async fn has_channel(&self, guild: GuildId, channel: ChannelId) -> Result<bool, Error> {
        let cached = self
            .cache
            .guild(guild)
            .map(|guild| guild.channels.contains_key(&channel));
        if let Some(found) = cached {
            return Ok(found);
        }

        Ok(guild.channels(&self.http).await?.contains_key(&channel))
    }

    async fn has_role(&self, guild: GuildId, role: RoleId) -> Result<bool, Error> {
        let cached = self
            .cache
            .guild(guild)
            .map(|guild| guild.roles.contains_key(&role));
        if let Some(found) = cached {
            return Ok(found);
        }

        Ok(guild.roles(&self.http).await?.contains_key(&role))
    }

    async fn send(&self, channel: ChannelId, notice: &Notice) -> Result<(), DeliveryError> {
        let mut embed = CreateEmbed::new()
            .title(&notice.title)
            .description(&notice.description)
            .colour(notice.colour)
            .fields(
                notice
                    .fields
                    .iter()
                    .map(|field| (field.name.clone(), field.value.clone(), field.inline)),
            );
        if let Ok(timestamp) = Timestamp::from_unix_timestamp(notice.timestamp.timestamp()) {
            embed = embed.timestamp(timestamp);
        }
        if let Some(thumbnail) = &notice.thumbnail {
            embed = embed.thumbnail(thumbnail);
        }

        let message = CreateMessage::new()
            .content(&notice.content)
            .embed(embed)
            .allowed_mentions(CreateAllowedMentions::new().roles([notice.mention_role]));

        match channel.send_message(self.cache_http(), message).await {
            Ok(_) => Ok(()),
            Err(err) if status_code(&err) == Some(403) => Err(DeliveryError::Forbidden),
            Err(err) => Err(DeliveryError::Other(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn community_guild_without_gate_is_not_screened() {
        assert!(!has_screening_gate(&features(&["COMMUNITY", "NEWS", "WELCOME_SCREEN_ENABLED"])));
        assert!(!has_screening_gate(&[]));
    }

    #[test]
    fn membership_gate_means_screening() {
        assert!(has_screening_gate(&features(&["COMMUNITY", SCREENING_FEATURE])));
    }
}
