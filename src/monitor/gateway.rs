//! Contracts the monitor needs from the chat platform.
//!
//! [`crate::utils::bot::DiscordGateway`] implements both traits on top of
//! serenity; tests use [`super::test_utils::FakeGateway`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{self as serenity, ChannelId, Colour, GuildId, RoleId, UserId};
use thiserror::Error;

use crate::Error;

/// The parts of a guild member a notification is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub id: UserId,
    pub pending: bool,
    pub display_name: String,
    pub tag: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub avatar_url: Option<String>,
}

fn to_chrono(timestamp: serenity::Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0)
}

impl From<&serenity::Member> for Applicant {
    fn from(member: &serenity::Member) -> Self {
        Applicant {
            id: member.user.id,
            pending: member.pending,
            display_name: member.display_name().to_string(),
            tag: member.user.tag(),
            joined_at: member.joined_at.and_then(to_chrono),
            created_at: to_chrono(member.user.created_at()).unwrap_or_default(),
            avatar_url: member.avatar_url().or_else(|| member.user.avatar_url()),
        }
    }
}

impl From<&serenity::GuildMemberUpdateEvent> for Applicant {
    fn from(event: &serenity::GuildMemberUpdateEvent) -> Self {
        Applicant {
            id: event.user.id,
            pending: event.pending,
            display_name: event
                .nick
                .clone()
                .unwrap_or_else(|| event.user.display_name().to_string()),
            tag: event.user.tag(),
            joined_at: to_chrono(event.joined_at),
            created_at: to_chrono(event.user.created_at()).unwrap_or_default(),
            avatar_url: event.user.avatar_url(),
        }
    }
}

#[async_trait]
pub trait MemberSource: Send + Sync {
    /// Guilds the bot is currently in.
    async fn guilds(&self) -> Result<Vec<GuildId>, Error>;

    /// Ids of all members still flagged as pending.
    async fn pending_members(&self, guild: GuildId) -> Result<Vec<UserId>, Error>;

    /// The live member, `None` if they are no longer in the guild.
    async fn member(&self, guild: GuildId, member: UserId) -> Result<Option<Applicant>, Error>;

    /// Whether the guild gates joins behind membership screening.
    async fn screening_enabled(&self, guild: GuildId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("missing permissions")]
    Forbidden,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoticeField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A composed notification: plain content plus one embed.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub content: String,
    pub title: String,
    pub description: String,
    pub colour: Colour,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<NoticeField>,
    pub thumbnail: Option<String>,
    /// The only role the message is allowed to ping.
    pub mention_role: RoleId,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn has_channel(&self, guild: GuildId, channel: ChannelId) -> Result<bool, Error>;

    async fn has_role(&self, guild: GuildId, role: RoleId) -> Result<bool, Error>;

    async fn send(&self, channel: ChannelId, notice: &Notice) -> Result<(), DeliveryError>;
}
