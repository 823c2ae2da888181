use chrono::{DateTime, Utc};
use poise::serenity_prelude::{Colour, GuildId, Mentionable, RoleId};
use thiserror::Error;

use super::gateway::{Applicant, DeliveryError, Messenger, Notice, NoticeField};
use super::settings::GuildSettings;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Application,
    Approval,
    Test,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Application => "application",
            NotificationKind::Approval => "approval",
            NotificationKind::Test => "test",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("missing permissions to send the notification")]
    Forbidden,
    #[error("failed to send the notification: {0}")]
    Unknown(String),
}

impl From<DeliveryError> for NotifyError {
    fn from(error: DeliveryError) -> Self {
        match error {
            DeliveryError::Forbidden => NotifyError::Forbidden,
            DeliveryError::Other(reason) => NotifyError::Unknown(reason),
        }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn compose(kind: NotificationKind, member: &Applicant, role: RoleId) -> Notice {
    let now = Utc::now();
    let user = NoticeField {
        name: "User".to_string(),
        value: format!("{} ({})", member.tag, member.id),
        inline: true,
    };
    let joined = member.joined_at.map_or_else(|| "Unknown".to_string(), format_time);
    let application_fields = |user: NoticeField| {
        vec![
            user,
            NoticeField {
                name: "Account Created".to_string(),
                value: format_time(member.created_at),
                inline: true,
            },
            NoticeField {
                name: "Joined At".to_string(),
                value: joined.clone(),
                inline: true,
            },
        ]
    };

    let (content, title, description, colour, timestamp, fields) = match kind {
        NotificationKind::Application => (
            "New application received!",
            "New Membership Application",
            format!("**{}** has applied to join the server.", member.id.mention()),
            Colour::BLUE,
            member.joined_at.unwrap_or(now),
            application_fields(user),
        ),
        NotificationKind::Approval => (
            "Member approved!",
            "Application Approved",
            format!(
                "**{}** has completed membership screening and joined the server!",
                member.id.mention()
            ),
            Colour::DARK_GREEN,
            now,
            vec![user, NoticeField {
                name: "Originally Joined".to_string(),
                value: joined.clone(),
                inline: true,
            }],
        ),
        NotificationKind::Test => (
            "Test notification.",
            "Test Notification",
            format!(
                "This is a test notification for **{}**. Application alerts will look like this.",
                member.id.mention()
            ),
            Colour::GOLD,
            now,
            application_fields(user),
        ),
    };

    Notice {
        content: format!("{} - {}", role.mention(), content),
        title: title.to_string(),
        description,
        colour,
        timestamp,
        fields,
        thumbnail: member.avatar_url.clone(),
        mention_role: role,
    }
}

/// Resolves the configured channel and role, then sends one notification.
///
/// Nothing is sent when either id is missing or cannot be resolved.
pub async fn notify<M: Messenger + ?Sized>(
    messenger: &M,
    guild: GuildId,
    settings: &GuildSettings,
    member: &Applicant,
    kind: NotificationKind,
) -> Result<(), NotifyError> {
    let channel = settings
        .notification_channel
        .ok_or_else(|| NotifyError::ConfigInvalid("no notification channel set".to_string()))?;
    let role = settings
        .notification_role
        .ok_or_else(|| NotifyError::ConfigInvalid("no notification role set".to_string()))?;

    let channel_found = messenger
        .has_channel(guild, channel)
        .await
        .map_err(|err| NotifyError::Unknown(err.to_string()))?;
    if !channel_found {
        return Err(NotifyError::ConfigInvalid(format!(
            "notification channel {channel} does not exist"
        )));
    }

    let role_found = messenger
        .has_role(guild, role)
        .await
        .map_err(|err| NotifyError::Unknown(err.to_string()))?;
    if !role_found {
        return Err(NotifyError::ConfigInvalid(format!(
            "notification role {role} does not exist"
        )));
    }

    let notice = compose(kind, member, role);
    messenger.send(channel, &notice).await?;

    Ok(())
}
