//! Periodic reconciliation of pending applicants.
//!
//! One task per process. After the gateway reports ready, every pass walks
//! all guilds, diffs the pending members of each monitored guild against the
//! tracker and announces the new ones. Failures are confined to the guild
//! (or member) they happened in and retried on the next pass.

use std::sync::Arc;
use std::time::Duration;

use poise::serenity_prelude::GuildId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::gateway::{MemberSource, Messenger};
use super::log::LogLevel;
use super::notifier::{notify, NotificationKind, NotifyError};
use super::ApplicationMonitor;
use crate::Error;

/// Default delay between two passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    WaitingReady,
    Running,
    Sleeping,
    Cancelled,
}

/// What one guild's reconciliation did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GuildReport {
    pub pending: usize,
    pub new: usize,
    pub notified: usize,
}

pub struct Reconciler<G> {
    monitor: Arc<ApplicationMonitor>,
    gateway: Arc<G>,
    interval: Duration,
    state: watch::Sender<LoopState>,
}

impl<G: MemberSource + Messenger> Reconciler<G> {
    pub fn new(monitor: Arc<ApplicationMonitor>, gateway: Arc<G>, interval: Duration) -> Self {
        let (state, _) = watch::channel(LoopState::Starting);

        Reconciler {
            monitor,
            gateway,
            interval,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn enter(&self, state: LoopState) {
        debug!("Reconciliation loop is {:?}", state);
        self.state.send_replace(state);
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Work in flight when the token fires is abandoned; snapshots already
    /// updated stay updated.
    pub async fn run(self, shutdown: CancellationToken) {
        self.enter(LoopState::WaitingReady);

        let mut ready = self.monitor.ready_signal();
        let became_ready = tokio::select! {
            _ = shutdown.cancelled() => false,
            woke = async { ready.wait_for(|is_ready| *is_ready).await.is_ok() } => woke,
        };

        if became_ready {
            info!("Reconciliation loop started");

            loop {
                self.enter(LoopState::Running);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.pass() => {},
                }

                self.enter(LoopState::Sleeping);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {},
                }
            }
        }

        self.enter(LoopState::Cancelled);
        info!("Reconciliation loop stopped");
    }

    /// One pass over every guild.
    pub async fn pass(&self) {
        let guilds = match self.gateway.guilds().await {
            Ok(guilds) => guilds,
            Err(err) => {
                error!("Failed to list guilds for reconciliation: {}", err);
                return;
            },
        };

        for guild in guilds {
            if let Err(err) = self.reconcile_guild(guild).await {
                self.monitor.record(
                    guild,
                    LogLevel::Error,
                    format!("Reconciliation failed: {err}"),
                );
            }
        }
    }

    pub async fn reconcile_guild(&self, guild: GuildId) -> Result<GuildReport, Error> {
        let settings = self.monitor.settings.get(guild).await?;
        if !settings.enabled {
            return Ok(GuildReport::default());
        }

        // Held across the listing so a concurrent removal is not undone by a
        // stale member list.
        let mut snapshot = self.monitor.tracker.lock(guild).await;
        let pending = self.gateway.pending_members(guild).await?;
        let was_seeded = snapshot.is_seeded();
        let new_ids = snapshot.diff_and_update(pending.iter().copied());
        drop(snapshot);

        let mut report = GuildReport {
            pending: pending.len(),
            new: new_ids.len(),
            notified: 0,
        };

        if !was_seeded {
            self.monitor.trace(
                guild,
                &settings,
                format!("Seeded {} pending member(s) on first pass", pending.len()),
            );
        }
        self.monitor.trace(
            guild,
            &settings,
            format!("{} pending member(s), {} new", report.pending, report.new),
        );

        for id in new_ids {
            let member = match self.gateway.member(guild, id).await {
                Ok(Some(member)) => member,
                Ok(None) => {
                    self.monitor
                        .trace(guild, &settings, format!("Pending member {id} already left"));
                    continue;
                },
                Err(err) => {
                    self.monitor.record(
                        guild,
                        LogLevel::Error,
                        format!("Failed to fetch pending member {id}: {err}"),
                    );
                    continue;
                },
            };

            match notify(
                self.gateway.as_ref(),
                guild,
                &settings,
                &member,
                NotificationKind::Application,
            )
            .await
            {
                Ok(()) => {
                    report.notified += 1;
                    self.monitor.record(
                        guild,
                        LogLevel::Info,
                        format!(
                            "Sent {} notification for {}",
                            NotificationKind::Application.label(),
                            member.tag
                        ),
                    );
                },
                Err(err) => self.monitor.record(guild, failure_level(&err), err.to_string()),
            }
        }

        Ok(report)
    }
}

pub(super) fn failure_level(error: &NotifyError) -> LogLevel {
    match error {
        NotifyError::ConfigInvalid(_) => LogLevel::Warning,
        NotifyError::Forbidden | NotifyError::Unknown(_) => LogLevel::Error,
    }
}
