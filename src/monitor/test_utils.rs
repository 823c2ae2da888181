use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use tokio::sync::Notify;

use super::gateway::{Applicant, DeliveryError, MemberSource, Messenger, Notice};
use super::settings::GuildSettings;
use crate::Error;

pub const GUILD: u64 = 100;
pub const CHANNEL: u64 = 200;
pub const ROLE: u64 = 300;

pub fn applicant(id: u64, pending: bool) -> Applicant {
    Applicant {
        id: UserId::new(id),
        pending,
        display_name: format!("member{id}"),
        tag: format!("member{id}#0001"),
        joined_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
        created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        avatar_url: Some(format!("https://cdn.example/{id}.png")),
    }
}

/// Enabled settings pointing at [`CHANNEL`] and [`ROLE`].
pub fn configured() -> GuildSettings {
    GuildSettings {
        enabled: true,
        notification_channel: Some(ChannelId::new(CHANNEL)),
        notification_role: Some(RoleId::new(ROLE)),
        debug: false,
    }
}

/// In-memory guilds, members and outbox.
#[derive(Default)]
pub struct FakeGateway {
    members: Mutex<HashMap<GuildId, HashMap<UserId, Applicant>>>,
    channels: Mutex<HashSet<ChannelId>>,
    roles: Mutex<HashSet<RoleId>>,
    screening: Mutex<HashSet<GuildId>>,
    failing_guilds: Mutex<HashSet<GuildId>>,
    vanished: Mutex<HashSet<UserId>>,
    send_failure: Mutex<Option<DeliveryError>>,
    sent: Mutex<Vec<(ChannelId, Notice)>>,
    listings: AtomicUsize,
    held_listing: Mutex<Option<ListingHold>>,
}

struct ListingHold {
    listed: Arc<Notify>,
    release: Arc<Notify>,
}

impl FakeGateway {
    /// A gateway where [`CHANNEL`] and [`ROLE`] resolve.
    pub fn with_target() -> Self {
        let gateway = FakeGateway::default();
        gateway.add_channel(CHANNEL);
        gateway.add_role(ROLE);
        gateway
    }

    pub fn add_channel(&self, id: u64) {
        self.channels.lock().unwrap().insert(ChannelId::new(id));
    }

    pub fn add_role(&self, id: u64) {
        self.roles.lock().unwrap().insert(RoleId::new(id));
    }

    pub fn add_guild(&self, guild: u64) {
        self.members.lock().unwrap().entry(GuildId::new(guild)).or_default();
    }

    pub fn set_member(&self, guild: u64, member: Applicant) {
        self.members
            .lock()
            .unwrap()
            .entry(GuildId::new(guild))
            .or_default()
            .insert(member.id, member);
    }

    pub fn set_pending(&self, guild: u64, pending: &[u64]) {
        for &id in pending {
            self.set_member(guild, applicant(id, true));
        }
    }

    pub fn remove_member(&self, guild: u64, id: u64) {
        if let Some(members) = self.members.lock().unwrap().get_mut(&GuildId::new(guild)) {
            members.remove(&UserId::new(id));
        }
    }

    /// Listed as pending but gone by the time it is fetched.
    pub fn vanish_on_fetch(&self, id: u64) {
        self.vanished.lock().unwrap().insert(UserId::new(id));
    }

    pub fn enable_screening(&self, guild: u64) {
        self.screening.lock().unwrap().insert(GuildId::new(guild));
    }

    pub fn fail_listing(&self, guild: u64) {
        self.failing_guilds.lock().unwrap().insert(GuildId::new(guild));
    }

    pub fn fail_sends_with(&self, failure: Option<DeliveryError>) {
        *self.send_failure.lock().unwrap() = failure;
    }

    /// The next listing reads the pending members, signals the first
    /// returned handle and then waits on the second before returning them.
    pub fn hold_next_listing(&self) -> (Arc<Notify>, Arc<Notify>) {
        let listed = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.held_listing.lock().unwrap() = Some(ListingHold {
            listed: listed.clone(),
            release: release.clone(),
        });
        (listed, release)
    }

    pub fn sent(&self) -> Vec<(ChannelId, Notice)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, notice)| notice.title).collect()
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemberSource for FakeGateway {
    async fn guilds(&self) -> Result<Vec<GuildId>, Error> {
        let mut guilds: Vec<_> = self.members.lock().unwrap().keys().copied().collect();
        guilds.sort_unstable();
        Ok(guilds)
    }

    async fn pending_members(&self, guild: GuildId) -> Result<Vec<UserId>, Error> {
        self.listings.fetch_add(1, Ordering::SeqCst);

        if self.failing_guilds.lock().unwrap().contains(&guild) {
            return Err(format!("listing members of {guild} failed").into());
        }

        let pending: Vec<UserId> = self
            .members
            .lock()
            .unwrap()
            .get(&guild)
            .map(|members| {
                members
                    .values()
                    .filter(|member| member.pending)
                    .map(|member| member.id)
                    .collect()
            })
            .unwrap_or_default();

        let hold = self.held_listing.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.listed.notify_one();
            hold.release.notified().await;
        }

        Ok(pending)
    }

    async fn member(&self, guild: GuildId, member: UserId) -> Result<Option<Applicant>, Error> {
        if self.vanished.lock().unwrap().contains(&member) {
            return Ok(None);
        }

        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&guild)
            .and_then(|members| members.get(&member).cloned()))
    }

    async fn screening_enabled(&self, guild: GuildId) -> bool {
        self.screening.lock().unwrap().contains(&guild)
    }
}

#[async_trait]
impl Messenger for FakeGateway {
    async fn has_channel(&self, _: GuildId, channel: ChannelId) -> Result<bool, Error> {
        Ok(self.channels.lock().unwrap().contains(&channel))
    }

    async fn has_role(&self, _: GuildId, role: RoleId) -> Result<bool, Error> {
        Ok(self.roles.lock().unwrap().contains(&role))
    }

    async fn send(&self, channel: ChannelId, notice: &Notice) -> Result<(), DeliveryError> {
        if let Some(failure) = self.send_failure.lock().unwrap().clone() {
            return Err(failure);
        }

        self.sent.lock().unwrap().push((channel, notice.clone()));
        Ok(())
    }
}
