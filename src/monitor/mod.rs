//! Membership application monitoring.
//!
//! New pending members are detected by diffing the guild's pending set
//! against the [`PendingTracker`] on every reconciliation pass; member
//! events cover screening completion and guilds without screening.

use std::sync::Arc;

use poise::serenity_prelude::GuildId;
use tokio::sync::watch;

use crate::Error;

pub mod gateway;
pub mod listeners;
pub mod log;
pub mod notifier;
pub mod reconcile;
pub mod settings;
#[cfg(test)]
pub mod test_utils;
pub mod tracker;

use gateway::MemberSource;
use self::log::{GuildLog, LogLevel};
use settings::{GuildSettings, SettingsPatch, SettingsStore};
use tracker::PendingTracker;

/// State shared by the reconciliation loop, the event listeners and the
/// commands.
pub struct ApplicationMonitor {
    pub settings: Arc<dyn SettingsStore>,
    pub tracker: PendingTracker,
    pub log: GuildLog,
    ready: watch::Sender<bool>,
}

impl ApplicationMonitor {
    pub fn new(settings: Arc<dyn SettingsStore>, log_capacity: usize) -> Self {
        let (ready, _) = watch::channel(false);

        ApplicationMonitor {
            settings,
            tracker: PendingTracker::new(),
            log: GuildLog::new(log_capacity),
            ready,
        }
    }

    /// Signals that the gateway session is established.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn record(&self, guild: GuildId, level: LogLevel, message: impl Into<String>) {
        self.log.append(guild, level, message);
    }

    /// Records a debug entry if the guild asked for them.
    pub fn trace(&self, guild: GuildId, settings: &GuildSettings, message: impl Into<String>) {
        if settings.debug {
            self.log.append(guild, LogLevel::Debug, message);
        }
    }

    /// Turns monitoring on or off.
    ///
    /// Enabling seeds the tracker with everyone currently pending so that
    /// existing applicants are not announced. Disabling drops the guild's
    /// snapshot.
    pub async fn set_enabled<S: MemberSource + ?Sized>(
        &self,
        source: &S,
        guild: GuildId,
        enabled: bool,
    ) -> Result<GuildSettings, Error> {
        if !enabled {
            let settings = self
                .settings
                .update(guild, SettingsPatch {
                    enabled: Some(false),
                    ..Default::default()
                })
                .await?;
            self.tracker.clear(guild).await;
            self.record(guild, LogLevel::Info, "Application monitoring disabled");
            return Ok(settings);
        }

        let mut snapshot = self.tracker.lock(guild).await;
        let pending = source.pending_members(guild).await?;
        let seeded = pending.len();
        snapshot.seed(pending);

        let settings = self
            .settings
            .update(guild, SettingsPatch {
                enabled: Some(true),
                ..Default::default()
            })
            .await?;
        drop(snapshot);

        self.record(
            guild,
            LogLevel::Info,
            format!("Application monitoring enabled, {seeded} pending member(s) already known"),
        );
        Ok(settings)
    }

    /// Replaces the guild's snapshot with the current pending set.
    ///
    /// Returns the number of pending members seeded.
    pub async fn reset<S: MemberSource + ?Sized>(
        &self,
        source: &S,
        guild: GuildId,
    ) -> Result<usize, Error> {
        let mut snapshot = self.tracker.lock(guild).await;
        let pending = source.pending_members(guild).await?;
        let seeded = pending.len();
        snapshot.seed(pending);
        drop(snapshot);

        self.record(
            guild,
            LogLevel::Info,
            format!("Pending members reset, {seeded} pending member(s) tracked"),
        );
        Ok(seeded)
    }
}
