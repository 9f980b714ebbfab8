use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use soundbooth::{
    common::types::{AnyResult, ChannelId, GuildId},
    session::{InactivitySweeper, SessionRegistry, TIMEOUT_NOTICE},
    voice::{
        BoxedChannel, BoxedConnection, ConnectionDirectory, VoiceConnection,
        loopback::{LoopbackChannel, LoopbackDirectory},
    },
};

const TIMEOUT: Duration = Duration::from_secs(5 * 60);
const INTERVAL: Duration = Duration::from_secs(30);

const GUILD: GuildId = GuildId(1);
const VOICE: ChannelId = ChannelId(200);

struct Setup {
    registry: Arc<SessionRegistry>,
    directory: Arc<LoopbackDirectory>,
    text: Arc<LoopbackChannel>,
}

impl Setup {
    fn new() -> Self {
        let directory = Arc::new(LoopbackDirectory::new([GUILD]));
        let registry = Arc::new(SessionRegistry::new());
        registry.initialize([GUILD]);
        Self {
            registry,
            directory,
            text: Arc::new(LoopbackChannel::new(ChannelId(100))),
        }
    }

    fn sweeper(&self) -> InactivitySweeper {
        InactivitySweeper::with_timings(
            self.registry.clone(),
            self.directory.clone(),
            TIMEOUT,
            INTERVAL,
        )
    }

    /// Connected, with a command recorded right now.
    async fn active_session(&self) {
        let channel: BoxedChannel = self.text.clone();
        self.registry.record_activity(GUILD, channel);
        self.directory
            .connection(GUILD)
            .unwrap()
            .connect(VOICE)
            .await
            .unwrap();
    }

    fn is_connected(&self) -> bool {
        self.directory.connection(GUILD).unwrap().is_connected()
    }
}

#[tokio::test(start_paused = true)]
async fn idle_guild_is_disconnected_between_five_and_five_thirty() {
    let setup = Setup::new();
    setup.active_session().await;
    let handle = setup.sweeper().spawn();

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(setup.is_connected());
    assert!(setup.registry.get(GUILD).is_active());

    tokio::time::sleep(Duration::from_secs(31)).await;
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
    assert!(!setup.is_connected());
    assert!(!setup.registry.get(GUILD).is_active());
    assert_eq!(setup.text.messages(), vec![TIMEOUT_NOTICE.to_string()]);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn fresh_activity_postpones_the_timeout() {
    let setup = Setup::new();
    setup.active_session().await;
    let handle = setup.sweeper().spawn();

    tokio::time::sleep(Duration::from_secs(240)).await;
    let channel: BoxedChannel = setup.text.clone();
    setup.registry.record_activity(GUILD, channel);

    tokio::time::sleep(Duration::from_secs(240)).await;
    assert!(setup.is_connected());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(!setup.is_connected());

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn untracked_connection_is_adopted_without_notice() {
    let setup = Setup::new();
    setup.directory.connection(GUILD).unwrap().force_connected(VOICE);
    let sweeper = setup.sweeper();

    let report = sweeper.sweep_once().await;
    assert_eq!(report.reconciled, vec![GUILD]);
    let slot = setup.registry.get(GUILD);
    assert!(slot.record().unwrap().last_channel().is_none());

    let report = sweeper.sweep_once().await;
    assert!(report.is_quiet());

    // The placeholder ages out like any other record, silently.
    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    let report = sweeper.sweep_once().await;
    assert_eq!(report.timed_out, vec![GUILD]);
    assert!(!setup.is_connected());
    assert!(setup.text.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sweeping_a_cleared_guild_twice_does_nothing_more() {
    let setup = Setup::new();
    setup.active_session().await;
    let sweeper = setup.sweeper();

    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    assert_eq!(sweeper.sweep_once().await.timed_out, vec![GUILD]);
    assert!(sweeper.sweep_once().await.is_quiet());
    assert!(sweeper.sweep_once().await.is_quiet());

    let conn = setup.directory.connection(GUILD).unwrap();
    assert_eq!(conn.disconnect_count(), 1);
    assert_eq!(setup.text.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_record_without_a_connection_is_left_alone() {
    let setup = Setup::new();
    let channel: BoxedChannel = setup.text.clone();
    setup.registry.record_activity(GUILD, channel);

    tokio::time::advance(TIMEOUT * 2).await;
    assert!(setup.sweeper().sweep_once().await.is_quiet());
    assert!(setup.registry.get(GUILD).is_active());
    assert!(setup.text.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unresolvable_guild_is_skipped() {
    let setup = Setup::new();
    setup.active_session().await;
    setup.directory.set_reachable(GUILD, false);

    tokio::time::advance(TIMEOUT * 2).await;
    let report = setup.sweeper().sweep_once().await;
    assert_eq!(report.unresolved, vec![GUILD]);
    assert!(setup.is_connected());
    assert!(setup.registry.get(GUILD).is_active());

    setup.directory.set_reachable(GUILD, true);
    let report = setup.sweeper().sweep_once().await;
    assert_eq!(report.timed_out, vec![GUILD]);
}

#[tokio::test(start_paused = true)]
async fn failed_notice_does_not_stop_the_disconnect() {
    let setup = Setup::new();
    setup.active_session().await;
    setup.text.set_failing(true);

    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    let report = setup.sweeper().sweep_once().await;
    assert_eq!(report.timed_out, vec![GUILD]);
    assert!(!setup.is_connected());
    assert!(!setup.registry.get(GUILD).is_active());
}

#[tokio::test(start_paused = true)]
async fn failed_disconnect_is_retried_next_sweep() {
    let setup = Setup::new();
    setup.active_session().await;
    setup.directory.connection(GUILD).unwrap().fail_next_disconnect();
    let sweeper = setup.sweeper();

    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    let report = sweeper.sweep_once().await;
    assert_eq!(report.failed, vec![GUILD]);
    assert!(setup.is_connected());
    assert!(setup.registry.get(GUILD).is_active());
    assert!(setup.text.messages().is_empty());

    tokio::time::advance(INTERVAL).await;
    let report = sweeper.sweep_once().await;
    assert_eq!(report.timed_out, vec![GUILD]);
    assert!(report.reconciled.is_empty());
    assert!(!setup.is_connected());
    assert_eq!(setup.text.messages(), vec![TIMEOUT_NOTICE.to_string()]);
}

/// Panics when asked about one particular guild.
struct PanickingDirectory {
    inner: LoopbackDirectory,
    poisoned: GuildId,
}

#[async_trait]
impl ConnectionDirectory for PanickingDirectory {
    fn resolve(&self, guild_id: GuildId) -> Option<BoxedConnection> {
        if guild_id == self.poisoned {
            panic!("cache corrupted for {}", guild_id);
        }
        self.inner.resolve(guild_id)
    }

    async fn known_guilds(&self) -> AnyResult<Vec<GuildId>> {
        self.inner.known_guilds().await
    }
}

#[tokio::test(start_paused = true)]
async fn one_guild_failing_does_not_stop_the_sweep() {
    let directory = Arc::new(PanickingDirectory {
        inner: LoopbackDirectory::new([GuildId(1), GuildId(2)]),
        poisoned: GuildId(1),
    });
    let registry = Arc::new(SessionRegistry::new());
    registry.initialize([GuildId(1), GuildId(2)]);

    let healthy = directory.inner.connection(GuildId(2)).unwrap();
    healthy.connect(VOICE).await.unwrap();
    let text = Arc::new(LoopbackChannel::new(ChannelId(100)));
    let channel: BoxedChannel = text.clone();
    registry.record_activity(GuildId(2), channel);

    let sweeper =
        InactivitySweeper::with_timings(registry.clone(), directory.clone(), TIMEOUT, INTERVAL);
    tokio::time::advance(TIMEOUT + Duration::from_secs(1)).await;
    let report = sweeper.sweep_once().await;

    assert_eq!(report.failed, vec![GuildId(1)]);
    assert_eq!(report.timed_out, vec![GuildId(2)]);
    assert!(!healthy.is_connected());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let setup = Setup::new();
    let handle = setup.sweeper().spawn();

    tokio::time::sleep(INTERVAL * 3).await;
    assert!(!handle.is_finished());
    handle.shutdown().await.unwrap();
}
