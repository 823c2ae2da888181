use std::collections::HashMap;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use tokio::sync::RwLock;

use crate::Error;

/// Per-guild monitor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildSettings {
    pub enabled: bool,
    pub notification_channel: Option<ChannelId>,
    pub notification_role: Option<RoleId>,
    pub debug: bool,
}

/// Partial update. `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub notification_channel: Option<Option<ChannelId>>,
    pub notification_role: Option<Option<RoleId>>,
    pub debug: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.notification_channel.is_none()
            && self.notification_role.is_none()
            && self.debug.is_none()
    }

    pub fn apply(&self, settings: &mut GuildSettings) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(channel) = self.notification_channel {
            settings.notification_channel = channel;
        }
        if let Some(role) = self.notification_role {
            settings.notification_role = role;
        }
        if let Some(debug) = self.debug {
            settings.debug = debug;
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings of the guild, defaults when nothing was stored yet.
    async fn get(&self, guild: GuildId) -> Result<GuildSettings, Error>;

    /// Applies `patch` and returns the resulting settings.
    async fn update(&self, guild: GuildId, patch: SettingsPatch) -> Result<GuildSettings, Error>;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    guilds: RwLock<HashMap<GuildId, GuildSettings>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, guild: GuildId) -> Result<GuildSettings, Error> {
        Ok(self.guilds.read().await.get(&guild).cloned().unwrap_or_default())
    }

    async fn update(&self, guild: GuildId, patch: SettingsPatch) -> Result<GuildSettings, Error> {
        let mut guilds = self.guilds.write().await;
        let settings = guilds.entry(guild).or_default();
        patch.apply(settings);
        Ok(settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn patch_only_touches_given_fields() {
        let store = MemorySettings::default();
        let guild = GuildId::new(5);

        store
            .update(guild, SettingsPatch {
                notification_channel: Some(Some(ChannelId::new(11))),
                notification_role: Some(Some(RoleId::new(12))),
                ..Default::default()
            })
            .await
            .unwrap();

        let settings = store
            .update(guild, SettingsPatch {
                enabled: Some(true),
                notification_role: Some(None),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(settings, GuildSettings {
            enabled: true,
            notification_channel: Some(ChannelId::new(11)),
            notification_role: None,
            debug: false,
        });
        assert_eq!(store.get(guild).await.unwrap(), settings);
    }

    #[tokio::test]
    async fn unknown_guild_has_defaults() {
        let store = MemorySettings::default();
        assert_eq!(store.get(GuildId::new(1)).await.unwrap(), GuildSettings::default());
    }
}
