use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{
    common::types::GuildId,
    session::record::{SessionRecord, TenantLock},
    voice::BoxedChannel,
};

/// What the registry knows about a guild.
#[derive(Debug, Clone)]
pub enum RecordSlot {
    /// Never seen since startup.
    Unobserved,
    /// Seen before, no active record (never used, timed out, or left).
    Vacant,
    Active(SessionRecord),
}

impl RecordSlot {
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            Self::Active(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Guild id -> optional session record.
///
/// Every operation is a short, synchronous critical section on one map shard.
/// Nothing here awaits, so no shard guard ever lives across a suspension point.
#[derive(Default)]
pub struct SessionRegistry {
    records: DashMap<GuildId, Option<SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an empty entry for every guild the platform reports at startup.
    pub fn initialize(&self, guilds: impl IntoIterator<Item = GuildId>) {
        for guild_id in guilds {
            self.records.insert(guild_id, None);
        }
        debug!("Session registry seeded with {} guilds", self.records.len());
    }

    pub fn get(&self, guild_id: GuildId) -> RecordSlot {
        match self.records.get(&guild_id) {
            None => RecordSlot::Unobserved,
            Some(entry) => match entry.value() {
                Some(record) => RecordSlot::Active(record.clone()),
                None => RecordSlot::Vacant,
            },
        }
    }

    /// Creates or refreshes the guild's record and returns its lock.
    pub fn record_activity(&self, guild_id: GuildId, channel: BoxedChannel) -> TenantLock {
        let mut entry = self.records.entry(guild_id).or_insert(None);
        let slot = entry.value_mut();
        if let Some(record) = slot.as_mut() {
            record.touch(Some(channel));
            return record.lock();
        }

        trace!("[{}] New session record", guild_id);
        let record = SessionRecord::new(Some(channel));
        let lock = record.lock();
        *slot = Some(record);
        lock
    }

    /// Empties the guild's entry. Returns whether there was a record to drop.
    pub fn clear(&self, guild_id: GuildId) -> bool {
        let mut entry = self.records.entry(guild_id).or_insert(None);
        entry.value_mut().take().is_some()
    }

    pub fn lock_for(&self, guild_id: GuildId) -> Option<TenantLock> {
        self.records
            .get(&guild_id)
            .and_then(|entry| entry.value().as_ref().map(SessionRecord::lock))
    }

    /// Snapshot of every guild with an entry.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.records.iter().map(|entry| *entry.key()).collect()
    }

    /// Clears and returns the record if it is still idle at `now`. A command
    /// that refreshed the record since the caller last looked keeps it.
    pub fn take_if_idle(
        &self,
        guild_id: GuildId,
        idle_timeout: Duration,
        now: Instant,
    ) -> Option<SessionRecord> {
        let mut entry = self.records.get_mut(&guild_id)?;
        let slot = entry.value_mut();
        if slot.as_ref()?.is_idle_at(idle_timeout, now) {
            slot.take()
        } else {
            None
        }
    }

    /// Puts back a record taken by [`SessionRegistry::take_if_idle`], unless a
    /// command has created a fresh one in the meantime.
    pub fn restore(&self, guild_id: GuildId, record: SessionRecord) -> bool {
        let mut entry = self.records.entry(guild_id).or_insert(None);
        let slot = entry.value_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(record);
        true
    }

    /// Installs a placeholder record unless one is already active.
    pub fn adopt_orphan(&self, guild_id: GuildId) -> bool {
        let mut entry = self.records.entry(guild_id).or_insert(None);
        let slot = entry.value_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(SessionRecord::placeholder());
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
