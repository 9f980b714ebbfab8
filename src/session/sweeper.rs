use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    common::{errors::VoiceError, types::GuildId},
    configs::VoiceConfig,
    session::registry::SessionRegistry,
    voice::ConnectionDirectory,
};

pub const TIMEOUT_NOTICE: &str = "Disconnected from voice due to inactivity.";

/// What one sweep did, guild by guild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: Vec<GuildId>,
    pub reconciled: Vec<GuildId>,
    /// Guilds the directory couldn't resolve; retried next sweep.
    pub unresolved: Vec<GuildId>,
    pub failed: Vec<GuildId>,
}

impl SweepReport {
    pub fn is_quiet(&self) -> bool {
        self.timed_out.is_empty() && self.reconciled.is_empty() && self.failed.is_empty()
    }
}

enum Transition {
    Unresolved,
    Idle,
    TimedOut,
    Reconciled,
}

/// Background loop that disconnects guilds nobody has used for a while and
/// adopts connections the registry lost track of.
///
/// It never takes a guild's command lock. A command connecting at the same
/// moment the sweeper disconnects costs at worst one spurious timeout notice.
pub struct InactivitySweeper {
    registry: Arc<SessionRegistry>,
    directory: Arc<dyn ConnectionDirectory>,
    idle_timeout: Duration,
    interval: Duration,
}

impl InactivitySweeper {
    pub fn new(
        registry: Arc<SessionRegistry>,
        directory: Arc<dyn ConnectionDirectory>,
        config: &VoiceConfig,
    ) -> Self {
        Self::with_timings(
            registry,
            directory,
            config.idle_timeout(),
            config.check_interval(),
        )
    }

    pub fn with_timings(
        registry: Arc<SessionRegistry>,
        directory: Arc<dyn ConnectionDirectory>,
        idle_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            directory,
            idle_timeout,
            interval,
        }
    }

    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        SweeperHandle { cancel, task }
    }

    /// Sleeps, sweeps, repeats until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Inactivity sweeper started: timeout {:?}, checking every {:?}",
            self.idle_timeout, self.interval
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let report = self.sweep(&cancel).await;
            if !report.is_quiet() {
                debug!("Sweep finished: {:?}", report);
            }
        }

        debug!("Inactivity sweeper cancelled");
    }

    /// One pass over every known guild.
    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep(&CancellationToken::new()).await
    }

    async fn sweep(&self, cancel: &CancellationToken) -> SweepReport {
        let mut report = SweepReport::default();

        for guild_id in self.registry.guild_ids() {
            if cancel.is_cancelled() {
                break;
            }

            let outcome = AssertUnwindSafe(self.sweep_guild(guild_id))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(Transition::Unresolved)) => report.unresolved.push(guild_id),
                Ok(Ok(Transition::Idle)) => {}
                Ok(Ok(Transition::TimedOut)) => report.timed_out.push(guild_id),
                Ok(Ok(Transition::Reconciled)) => report.reconciled.push(guild_id),
                Ok(Err(e)) => {
                    error!("[{}] Inactivity check failed: {}", guild_id, e);
                    report.failed.push(guild_id);
                }
                Err(panic) => {
                    error!(
                        "[{}] Inactivity check panicked: {}",
                        guild_id,
                        panic_message(panic.as_ref())
                    );
                    report.failed.push(guild_id);
                }
            }
        }

        report
    }

    async fn sweep_guild(&self, guild_id: GuildId) -> Result<Transition, VoiceError> {
        let Some(conn) = self.directory.resolve(guild_id) else {
            trace!("[{}] Guild not resolvable, retrying next sweep", guild_id);
            return Ok(Transition::Unresolved);
        };

        if !conn.is_connected() {
            return Ok(Transition::Idle);
        }

        if !self.registry.get(guild_id).is_active() {
            // A leave whose disconnect silently failed, or a connection made
            // before we were watching. Nobody to notify.
            if self.registry.adopt_orphan(guild_id) {
                info!("[{}] Adopted voice connection with no session record", guild_id);
                return Ok(Transition::Reconciled);
            }
            return Ok(Transition::Idle);
        }

        let Some(record) = self
            .registry
            .take_if_idle(guild_id, self.idle_timeout, Instant::now())
        else {
            return Ok(Transition::Idle);
        };

        if let Err(e) = conn.disconnect().await {
            // Retried next sweep, still with somewhere to send the notice
            self.registry.restore(guild_id, record);
            return Err(e);
        }

        if let Some(channel) = record.last_channel() {
            if let Err(e) = channel.send(TIMEOUT_NOTICE).await {
                warn!("[{}] Couldn't post timeout notice: {}", guild_id, e);
            }
        }

        info!("[{}] Voice connection timed out", guild_id);
        Ok(Transition::TimedOut)
    }
}

/// The sweeper died instead of being cancelled.
#[derive(Debug, thiserror::Error)]
#[error("inactivity sweeper stopped unexpectedly: {0}")]
pub struct SweeperFailure(String);

/// Owner's side of a spawned sweeper.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Resolves when the task ends. `Ok` only after cancellation.
    pub async fn wait(&mut self) -> Result<(), SweeperFailure> {
        let result = (&mut self.task).await;
        match result {
            Ok(()) if self.cancel.is_cancelled() => Ok(()),
            Ok(()) => Err(SweeperFailure("loop exited without being cancelled".to_string())),
            Err(e) if e.is_panic() => Err(SweeperFailure(panic_message(e.into_panic().as_ref()))),
            Err(e) => Err(SweeperFailure(e.to_string())),
        }
    }

    /// Cancels and waits for the loop to exit.
    pub async fn shutdown(mut self) -> Result<(), SweeperFailure> {
        self.cancel.cancel();
        self.wait().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_reports_a_panicked_loop() {
        let mut handle = SweeperHandle {
            cancel: CancellationToken::new(),
            task: tokio::spawn(async { panic!("registry poisoned") }),
        };

        let err = handle.wait().await.unwrap_err();
        assert!(err.to_string().contains("registry poisoned"));
    }

    #[tokio::test]
    async fn wait_reports_an_uncancelled_exit() {
        let mut handle = SweeperHandle {
            cancel: CancellationToken::new(),
            task: tokio::spawn(async {}),
        };

        assert!(handle.wait().await.is_err());
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&5u8), "unknown panic");
    }
}
