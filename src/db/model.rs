use std::fmt::Display;

use bson::{Bson, Document};
use poise::serenity_prelude::{ChannelId, RoleId};
use serde::{Deserialize, Serialize};

use crate::monitor::settings::{GuildSettings, SettingsPatch};

// Models
#[derive(Serialize, Deserialize, Debug)]
pub struct MonitorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

fn parse_id(id: Option<String>) -> Option<u64> {
    id.and_then(|id| id.parse::<u64>().ok()).filter(|id| *id != 0)
}

impl From<MonitorSettings> for GuildSettings {
    fn from(settings: MonitorSettings) -> Self {
        GuildSettings {
            enabled: settings.enabled.unwrap_or_default(),
            notification_channel: parse_id(settings.notification_channel).map(ChannelId::new),
            notification_role: parse_id(settings.notification_role).map(RoleId::new),
            debug: settings.debug.unwrap_or_default(),
        }
    }
}

fn id_or_null(id: Option<impl Display>) -> Bson {
    id.map_or(Bson::Null, |id| Bson::String(id.to_string()))
}

/// The `$set` body of a patch. Cleared ids are stored as `null`.
impl From<&SettingsPatch> for Document {
    fn from(patch: &SettingsPatch) -> Self {
        let mut document = Document::new();

        if let Some(enabled) = patch.enabled {
            document.insert("enabled", enabled);
        }
        if let Some(channel) = patch.notification_channel {
            document.insert("notification_channel", id_or_null(channel));
        }
        if let Some(role) = patch.notification_role {
            document.insert("notification_role", id_or_null(role));
        }
        if let Some(debug) = patch.debug {
            document.insert("debug", debug);
        }

        document
    }
}
