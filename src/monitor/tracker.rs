use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use poise::serenity_prelude::{GuildId, UserId};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<Snapshot>>;

/// Member ids last seen as pending in one guild.
///
/// `None` until the guild is seeded. The set is a watermark of what has
/// already been handled, not a mirror of the live member list.
#[derive(Debug, Default)]
pub struct Snapshot {
    members: Option<HashSet<UserId>>,
}

impl Snapshot {
    pub fn is_seeded(&self) -> bool {
        self.members.is_some()
    }

    pub fn len(&self) -> usize {
        self.members.as_ref().map_or(0, HashSet::len)
    }

    pub fn contains(&self, member: UserId) -> bool {
        self.members
            .as_ref()
            .is_some_and(|members| members.contains(&member))
    }

    /// Replaces the snapshot. Every id passed here is considered handled.
    pub fn seed(&mut self, pending: impl IntoIterator<Item = UserId>) {
        self.members = Some(pending.into_iter().collect());
    }

    /// Returns `pending - stored` and stores `pending`.
    ///
    /// An unseeded snapshot is seeded instead and nothing is reported, so a
    /// fresh process does not announce applicants that predate it.
    pub fn diff_and_update(&mut self, pending: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
        let current: HashSet<UserId> = pending.into_iter().collect();

        let mut new_ids: Vec<UserId> = match &self.members {
            Some(stored) => current.difference(stored).copied().collect(),
            None => Vec::new(),
        };
        new_ids.sort_unstable();

        self.members = Some(current);
        new_ids
    }

    pub fn remove(&mut self, member: UserId) -> bool {
        self.members
            .as_mut()
            .is_some_and(|members| members.remove(&member))
    }

    fn clear(&mut self) {
        self.members = None;
    }
}

/// Process-wide guild → [`Snapshot`] map.
///
/// Each guild has its own async lock. Callers that need a read-modify-write
/// spanning a network call (list members, then diff) hold the guard from
/// [`PendingTracker::lock`] for the whole sequence.
#[derive(Debug, Default)]
pub struct PendingTracker {
    guilds: Mutex<HashMap<GuildId, Slot>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, guild: GuildId) -> Slot {
        let mut guilds = self.guilds.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guilds.entry(guild).or_default().clone()
    }

    pub async fn lock(&self, guild: GuildId) -> OwnedMutexGuard<Snapshot> {
        self.slot(guild).lock_owned().await
    }

    pub async fn seed(&self, guild: GuildId, pending: impl IntoIterator<Item = UserId>) {
        self.lock(guild).await.seed(pending);
    }

    pub async fn diff_and_update(
        &self,
        guild: GuildId,
        pending: impl IntoIterator<Item = UserId>,
    ) -> Vec<UserId> {
        self.lock(guild).await.diff_and_update(pending)
    }

    pub async fn remove(&self, guild: GuildId, member: UserId) -> bool {
        self.lock(guild).await.remove(member)
    }

    pub async fn contains(&self, guild: GuildId, member: UserId) -> bool {
        self.lock(guild).await.contains(member)
    }

    pub async fn tracked(&self, guild: GuildId) -> usize {
        self.lock(guild).await.len()
    }

    /// Drops the guild entry. A holder of an older guard sees an unseeded
    /// snapshot once it gets the lock.
    pub async fn clear(&self, guild: GuildId) {
        let slot = {
            let mut guilds = self.guilds.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guilds.remove(&guild)
        };

        if let Some(slot) = slot {
            slot.lock().await.clear();
        }
    }
}
