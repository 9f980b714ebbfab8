use std::{future::Future, sync::Arc};

use tracing::debug;

use crate::{
    common::{errors::Denial, types::GuildId},
    session::{record::TenantLock, registry::SessionRegistry},
    voice::BoxedChannel,
};

/// How a guarded command waits for the guild's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Reject with [`Denial::Busy`] if another command holds the lock.
    FailFast,
    /// Queue behind the current holder.
    Wait,
}

/// Wraps every voice-affecting command: records activity first, then runs
/// the connect/prepare step under the guild's lock. Activity is recorded
/// even when the lock is busy or the step fails.
#[derive(Clone)]
pub struct CommandGate {
    registry: Arc<SessionRegistry>,
}

impl CommandGate {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Records activity without taking the lock.
    pub fn touch(&self, guild_id: GuildId, channel: &BoxedChannel) {
        self.registry.record_activity(guild_id, channel.clone());
    }

    /// Records activity and hands back the guild's lock for a later
    /// [`Admission::run`]. Argument checks go between the two, so a command
    /// rejected for bad input has still reset the idle clock.
    pub fn admit(&self, guild_id: GuildId, channel: &BoxedChannel) -> Admission {
        Admission {
            guild_id,
            lock: self.registry.record_activity(guild_id, channel.clone()),
        }
    }

    /// [`CommandGate::admit`] followed directly by [`Admission::run`].
    pub async fn guard<F, Fut, T>(
        &self,
        guild_id: GuildId,
        channel: &BoxedChannel,
        policy: LockPolicy,
        step: F,
    ) -> Result<T, Denial>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Denial>>,
    {
        self.admit(guild_id, channel).run(policy, step).await
    }
}

/// Activity already recorded; the lock not yet taken.
pub struct Admission {
    guild_id: GuildId,
    lock: TenantLock,
}

impl Admission {
    /// Runs `step` while holding the guild's lock.
    ///
    /// The lock is released as soon as `step` resolves; playback it started
    /// keeps going without it.
    pub async fn run<F, Fut, T>(self, policy: LockPolicy, step: F) -> Result<T, Denial>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Denial>>,
    {
        let _held = match policy {
            LockPolicy::FailFast => self.lock.try_lock_owned().map_err(|_| {
                debug!("[{}] Voice lock busy, rejecting", self.guild_id);
                Denial::Busy
            })?,
            LockPolicy::Wait => self.lock.lock_owned().await,
        };
        step().await
    }
}
