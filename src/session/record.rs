use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};

use crate::{common::types::Shared, voice::BoxedChannel};

/// Serializes the connect/prepare step of one guild's voice commands.
pub type TenantLock = Shared<()>;

/// Per-guild voice bookkeeping: where the last voice command came from, when,
/// and the lock that guards connecting.
#[derive(Clone)]
pub struct SessionRecord {
    last_channel: Option<BoxedChannel>,
    last_activity: Instant,
    lock: TenantLock,
}

impl SessionRecord {
    pub fn new(last_channel: Option<BoxedChannel>) -> Self {
        Self {
            last_channel,
            last_activity: Instant::now(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// A record with nobody to notify, installed when a connection shows up
    /// that no command accounts for.
    pub fn placeholder() -> Self {
        Self::new(None)
    }

    /// Notes a new voice command. The lock is kept.
    pub fn touch(&mut self, last_channel: Option<BoxedChannel>) {
        self.last_channel = last_channel;
        self.last_activity = Instant::now();
    }

    pub fn last_channel(&self) -> Option<&BoxedChannel> {
        self.last_channel.as_ref()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn lock(&self) -> TenantLock {
        self.lock.clone()
    }

    /// True once `last_activity + idle_timeout` lies strictly before `now`.
    pub fn is_idle_at(&self, idle_timeout: Duration, now: Instant) -> bool {
        self.last_activity + idle_timeout < now
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("last_channel", &self.last_channel.as_ref().map(|c| c.id()))
            .field("last_activity", &self.last_activity)
            .field("locked", &self.lock.try_lock().is_err())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn idle_only_after_threshold_has_strictly_passed() {
        let record = SessionRecord::placeholder();
        let start = record.last_activity();
        let timeout = Duration::from_secs(300);

        assert!(!record.is_idle_at(timeout, start + Duration::from_secs(299)));
        assert!(!record.is_idle_at(timeout, start + timeout));
        assert!(record.is_idle_at(timeout, start + Duration::from_secs(301)));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_keeps_the_lock() {
        let mut record = SessionRecord::placeholder();
        let lock = record.lock();
        tokio::time::advance(Duration::from_secs(5)).await;

        record.touch(None);
        assert!(Arc::ptr_eq(&lock, &record.lock()));
        assert_eq!(record.last_activity(), Instant::now());
    }
}
