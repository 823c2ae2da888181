//! Member event hooks.
//!
//! Joins of guilds with screening are left to the reconciliation loop; joins
//! without screening are announced right away. Screening completion is
//! announced as an approval.

use poise::serenity_prelude::GuildId;
use tracing::debug;

use super::gateway::{Applicant, MemberSource, Messenger};
use super::log::LogLevel;
use super::notifier::{notify, NotificationKind};
use super::reconcile::failure_level;
use super::settings::GuildSettings;
use super::ApplicationMonitor;

async fn load_settings(monitor: &ApplicationMonitor, guild: GuildId) -> Option<GuildSettings> {
    match monitor.settings.get(guild).await {
        Ok(settings) => Some(settings),
        Err(err) => {
            monitor.record(guild, LogLevel::Error, format!("Failed to load settings: {err}"));
            None
        },
    }
}

async fn announce<G: Messenger + ?Sized>(
    monitor: &ApplicationMonitor,
    gateway: &G,
    guild: GuildId,
    settings: &GuildSettings,
    member: &Applicant,
    kind: NotificationKind,
) {
    match notify(gateway, guild, settings, member, kind).await {
        Ok(()) => monitor.record(
            guild,
            LogLevel::Info,
            format!("Sent {} notification for {}", kind.label(), member.tag),
        ),
        Err(err) => monitor.record(guild, failure_level(&err), err.to_string()),
    }
}

pub async fn on_member_join<G: MemberSource + Messenger + ?Sized>(
    monitor: &ApplicationMonitor,
    gateway: &G,
    guild: GuildId,
    member: &Applicant,
) {
    debug!("Member {} joined guild {}", member.tag, guild);

    let Some(settings) = load_settings(monitor, guild).await else {
        return;
    };
    monitor.trace(guild, &settings, format!("{} joined the server", member.tag));

    if !settings.enabled {
        return;
    }

    if member.pending || gateway.screening_enabled(guild).await {
        monitor.trace(
            guild,
            &settings,
            format!("{} is screened, leaving them to reconciliation", member.tag),
        );
        return;
    }

    announce(monitor, gateway, guild, &settings, member, NotificationKind::Application).await;
}

pub async fn on_member_update<G: Messenger + ?Sized>(
    monitor: &ApplicationMonitor,
    gateway: &G,
    guild: GuildId,
    old: Option<&Applicant>,
    new: &Applicant,
) {
    if new.pending {
        return;
    }

    // Without the cached old member, having tracked them as pending counts.
    let was_pending = match old {
        Some(old) => old.pending,
        None => monitor.tracker.contains(guild, new.id).await,
    };
    if !was_pending {
        return;
    }

    monitor.tracker.remove(guild, new.id).await;

    let Some(settings) = load_settings(monitor, guild).await else {
        return;
    };
    monitor.trace(guild, &settings, format!("{} completed screening", new.tag));

    if !settings.enabled || new.joined_at.is_none() {
        return;
    }

    if settings.notification_channel.is_none() || settings.notification_role.is_none() {
        monitor.trace(guild, &settings, "No channel or role set, skipping approval");
        return;
    }

    announce(monitor, gateway, guild, &settings, new, NotificationKind::Approval).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use poise::serenity_prelude::UserId;

    use super::*;
    use crate::monitor::settings::{MemorySettings, SettingsPatch};
    use crate::monitor::test_utils::{applicant, configured, FakeGateway, GUILD};

    async fn monitor_with(settings: GuildSettings) -> ApplicationMonitor {
        let monitor = ApplicationMonitor::new(Arc::new(MemorySettings::default()), 20);
        monitor
            .settings
            .update(GuildId::new(GUILD), SettingsPatch {
                enabled: Some(settings.enabled),
                notification_channel: Some(settings.notification_channel),
                notification_role: Some(settings.notification_role),
                debug: Some(settings.debug),
            })
            .await
            .unwrap();
        monitor
    }

    fn guild() -> GuildId {
        GuildId::new(GUILD)
    }

    #[tokio::test]
    async fn completed_screening_sends_one_approval_and_untracks() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();
        monitor.tracker.seed(guild(), [UserId::new(5), UserId::new(6)]).await;

        on_member_update(&monitor, &gateway, guild(), Some(&applicant(5, true)), &applicant(5, false))
            .await;

        assert_eq!(gateway.sent_titles(), ["Application Approved"]);
        assert!(!monitor.tracker.contains(guild(), UserId::new(5)).await);
        assert!(monitor.tracker.contains(guild(), UserId::new(6)).await);
    }

    #[tokio::test]
    async fn tracked_member_counts_as_pending_without_old_state() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();
        monitor.tracker.seed(guild(), [UserId::new(5)]).await;

        on_member_update(&monitor, &gateway, guild(), None, &applicant(5, false)).await;
        on_member_update(&monitor, &gateway, guild(), None, &applicant(5, false)).await;

        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn other_updates_are_ignored() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();

        on_member_update(&monitor, &gateway, guild(), Some(&applicant(5, false)), &applicant(5, false))
            .await;
        on_member_update(&monitor, &gateway, guild(), Some(&applicant(5, true)), &applicant(5, true))
            .await;
        on_member_update(&monitor, &gateway, guild(), None, &applicant(7, false)).await;

        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn approval_untracks_even_when_disabled() {
        let monitor = monitor_with(GuildSettings {
            enabled: false,
            ..configured()
        })
        .await;
        let gateway = FakeGateway::with_target();
        monitor.tracker.seed(guild(), [UserId::new(5)]).await;

        on_member_update(&monitor, &gateway, guild(), Some(&applicant(5, true)), &applicant(5, false))
            .await;

        assert!(gateway.sent().is_empty());
        assert!(!monitor.tracker.contains(guild(), UserId::new(5)).await);
    }

    #[tokio::test]
    async fn approval_without_role_is_skipped() {
        let monitor = monitor_with(GuildSettings {
            notification_role: None,
            ..configured()
        })
        .await;
        let gateway = FakeGateway::with_target();

        on_member_update(&monitor, &gateway, guild(), Some(&applicant(5, true)), &applicant(5, false))
            .await;

        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn join_without_screening_is_announced_immediately() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();

        on_member_join(&monitor, &gateway, guild(), &applicant(8, false)).await;

        assert_eq!(gateway.sent_titles(), ["New Membership Application"]);
    }

    #[tokio::test]
    async fn screened_join_is_left_to_reconciliation() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();
        gateway.enable_screening(GUILD);

        on_member_join(&monitor, &gateway, guild(), &applicant(8, false)).await;
        on_member_join(&monitor, &gateway, guild(), &applicant(9, true)).await;

        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn join_is_ignored_while_disabled() {
        let monitor = monitor_with(GuildSettings::default()).await;
        let gateway = FakeGateway::with_target();

        on_member_join(&monitor, &gateway, guild(), &applicant(8, false)).await;

        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_logged() {
        let monitor = monitor_with(configured()).await;
        let gateway = FakeGateway::with_target();
        gateway.fail_sends_with(Some(crate::monitor::gateway::DeliveryError::Forbidden));

        on_member_join(&monitor, &gateway, guild(), &applicant(8, false)).await;

        let entries = monitor.log.recent(guild(), 5);
        assert_eq!(entries.last().map(|entry| entry.level), Some(LogLevel::Error));
    }
}
