//! In-memory voice layer: connections that only track state, channels that
//! record what was posted. Backs the terminal driver and the test suite.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    common::{
        errors::VoiceError,
        types::{AnyResult, ChannelId, GuildId},
    },
    voice::{
        connection::{
            BoxedConnection, ConnectionDirectory, MediaResolver, NotificationChannel,
            SpeechSynthesizer, VoiceConnection,
        },
        source::{AudioSource, CompletionHook, RemoteMedia},
    },
};

/// Length assumed for sources that don't report one.
const DEFAULT_CLIP_LENGTH: Duration = Duration::from_secs(2);

struct ActiveTrack {
    source: AudioSource,
    on_completion: Option<CompletionHook>,
    remaining: Duration,
    /// `None` while paused.
    resumed_at: Option<Instant>,
    generation: u64,
}

#[derive(Default)]
struct CallState {
    channel: Option<ChannelId>,
    track: Option<ActiveTrack>,
    generation: u64,
}

impl CallState {
    fn take_hook(&mut self) -> Option<CompletionHook> {
        self.track.take().and_then(|track| track.on_completion)
    }
}

pub struct LoopbackConnection {
    guild_id: GuildId,
    state: Arc<Mutex<CallState>>,
    connect_latency: Mutex<Duration>,
    failing_disconnects: AtomicU32,
    ghost_disconnects: AtomicU32,
    connects: AtomicU32,
    moves: AtomicU32,
    disconnects: AtomicU32,
}

impl LoopbackConnection {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            state: Arc::new(Mutex::new(CallState::default())),
            connect_latency: Mutex::new(Duration::ZERO),
            failing_disconnects: AtomicU32::new(0),
            ghost_disconnects: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            moves: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        }
    }

    /// Makes every `connect` suspend for `latency` before completing.
    pub fn set_connect_latency(&self, latency: Duration) {
        *self.connect_latency.lock() = latency;
    }

    /// The next `disconnect` returns an error and leaves the bot connected.
    pub fn fail_next_disconnect(&self) {
        self.failing_disconnects.fetch_add(1, Ordering::SeqCst);
    }

    /// The next `disconnect` reports success but leaves the bot connected,
    /// like a leave racing a gateway resync.
    pub fn ghost_next_disconnect(&self) {
        self.ghost_disconnects.fetch_add(1, Ordering::SeqCst);
    }

    /// Puts the bot in `channel` without going through `connect`, as if the
    /// connection predates this process or was made by someone else.
    pub fn force_connected(&self, channel: ChannelId) {
        self.state.lock().channel = Some(channel);
    }

    /// A moderator kicked the bot out of voice.
    pub fn drop_connection(&self) {
        let hook = {
            let mut state = self.state.lock();
            state.channel = None;
            state.take_hook()
        };
        if let Some(hook) = hook {
            hook(None);
        }
    }

    /// Ends the current track with a stream error.
    pub fn fail_playback(&self, error: VoiceError) {
        let hook = self.state.lock().take_hook();
        if let Some(hook) = hook {
            hook(Some(error));
        }
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn move_count(&self) -> u32 {
        self.moves.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn schedule_finish(&self, generation: u64, after: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = self.state.clone();
        let guild_id = self.guild_id;
        handle.spawn(async move {
            tokio::time::sleep(after).await;
            let hook = {
                let mut state = state.lock();
                let finished = state
                    .track
                    .as_ref()
                    .is_some_and(|t| t.generation == generation && t.resumed_at.is_some());
                if !finished {
                    return;
                }
                state.take_hook()
            };
            debug!("[{}] Loopback track finished", guild_id);
            if let Some(hook) = hook {
                hook(None);
            }
        });
    }

    fn take_counter(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl VoiceConnection for LoopbackConnection {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn is_connected(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    fn current_channel(&self) -> Option<ChannelId> {
        self.state.lock().channel
    }

    async fn connect(&self, channel: ChannelId) -> Result<(), VoiceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let latency = *self.connect_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        if state.channel.is_some() {
            return Err(VoiceError::Gateway(
                "Already connected to a voice channel.".to_string(),
            ));
        }
        state.channel = Some(channel);
        Ok(())
    }

    async fn move_to(&self, channel: ChannelId) -> Result<(), VoiceError> {
        self.moves.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.channel.is_none() {
            return Err(VoiceError::NotConnected);
        }
        state.channel = Some(channel);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if Self::take_counter(&self.failing_disconnects) {
            return Err(VoiceError::Gateway(
                "voice gateway did not acknowledge the disconnect".to_string(),
            ));
        }
        if Self::take_counter(&self.ghost_disconnects) {
            return Ok(());
        }
        self.drop_connection();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state
            .lock()
            .track
            .as_ref()
            .is_some_and(|t| t.resumed_at.is_some())
    }

    fn is_paused(&self) -> bool {
        self.state
            .lock()
            .track
            .as_ref()
            .is_some_and(|t| t.resumed_at.is_none())
    }

    fn play(
        &self,
        source: AudioSource,
        on_completion: Option<CompletionHook>,
    ) -> Result<(), VoiceError> {
        let length = source.duration.unwrap_or(DEFAULT_CLIP_LENGTH);
        let generation = {
            let mut state = self.state.lock();
            if state.channel.is_none() {
                return Err(VoiceError::NotConnected);
            }
            if state.track.is_some() {
                return Err(VoiceError::Gateway("Already playing audio.".to_string()));
            }
            state.generation += 1;
            let generation = state.generation;
            state.track = Some(ActiveTrack {
                source,
                on_completion,
                remaining: length,
                resumed_at: Some(Instant::now()),
                generation,
            });
            generation
        };
        self.schedule_finish(generation, length);
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if let Some(track) = state.track.as_mut() {
            if let Some(started) = track.resumed_at.take() {
                track.remaining = track.remaining.saturating_sub(started.elapsed());
            }
        }
    }

    fn resume(&self) {
        let scheduled = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            match state.track.as_mut() {
                Some(track) if track.resumed_at.is_none() => {
                    track.resumed_at = Some(Instant::now());
                    track.generation = generation;
                    Some((generation, track.remaining))
                }
                _ => None,
            }
        };
        if let Some((generation, remaining)) = scheduled {
            self.schedule_finish(generation, remaining);
        }
    }

    fn stop(&self) {
        let hook = self.state.lock().take_hook();
        if let Some(hook) = hook {
            hook(None);
        }
    }

    fn current_source(&self) -> Option<AudioSource> {
        self.state.lock().track.as_ref().map(|t| t.source.clone())
    }

    fn set_volume(&self, volume: f32) {
        if let Some(track) = self.state.lock().track.as_mut() {
            track.source.volume = volume.clamp(0.0, 1.0);
        }
    }
}

/// A fixed set of guilds, each with one loopback connection.
pub struct LoopbackDirectory {
    connections: DashMap<GuildId, Arc<LoopbackConnection>>,
    unreachable: DashSet<GuildId>,
}

impl LoopbackDirectory {
    pub fn new(guilds: impl IntoIterator<Item = GuildId>) -> Self {
        let connections = DashMap::new();
        for guild_id in guilds {
            connections.insert(guild_id, Arc::new(LoopbackConnection::new(guild_id)));
        }
        Self {
            connections,
            unreachable: DashSet::new(),
        }
    }

    pub fn connection(&self, guild_id: GuildId) -> Option<Arc<LoopbackConnection>> {
        self.connections.get(&guild_id).map(|c| c.value().clone())
    }

    /// Unreachable guilds resolve to `None`, like a cache miss on the platform client.
    pub fn set_reachable(&self, guild_id: GuildId, reachable: bool) {
        if reachable {
            self.unreachable.remove(&guild_id);
        } else {
            self.unreachable.insert(guild_id);
        }
    }
}

#[async_trait]
impl ConnectionDirectory for LoopbackDirectory {
    fn resolve(&self, guild_id: GuildId) -> Option<BoxedConnection> {
        if self.unreachable.contains(&guild_id) {
            return None;
        }
        self.connections
            .get(&guild_id)
            .map(|c| c.value().clone() as BoxedConnection)
    }

    async fn known_guilds(&self) -> AnyResult<Vec<GuildId>> {
        let mut guilds: Vec<GuildId> = self.connections.iter().map(|c| *c.key()).collect();
        guilds.sort();
        Ok(guilds)
    }
}

/// Records every message; optionally echoes them to stdout.
pub struct LoopbackChannel {
    id: ChannelId,
    echo: bool,
    failing: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl LoopbackChannel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            echo: false,
            failing: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn echoing(id: ChannelId) -> Self {
        Self {
            echo: true,
            ..Self::new(id)
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for LoopbackChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, text: &str) -> Result<(), VoiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VoiceError::Delivery {
                channel: self.id,
                reason: "missing permissions".to_string(),
            });
        }
        if self.echo {
            crate::log_println!("#{} | {}", self.id, text);
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}

const LOOPBACK_LANGUAGES: &[(&str, &str)] = &[
    ("de", "German"),
    ("en", "English"),
    ("en-au", "English (Australia)"),
    ("en-uk", "English (UK)"),
    ("en-us", "English (US)"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("ja", "Japanese"),
];

/// Produces speech sources without synthesizing anything.
#[derive(Default)]
pub struct LoopbackSynthesizer;

#[async_trait]
impl SpeechSynthesizer for LoopbackSynthesizer {
    fn languages(&self) -> Vec<(String, String)> {
        LOOPBACK_LANGUAGES
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect()
    }

    async fn synthesize(&self, text: &str, lang: &str) -> Result<AudioSource, VoiceError> {
        // roughly one second per fifteen characters
        let length = Duration::from_millis(500 + 66 * text.chars().count() as u64);
        Ok(AudioSource::speech(lang, text, Some(length)))
    }
}

/// Treats the query itself as the title of a three and a half minute track.
#[derive(Default)]
pub struct LoopbackResolver;

#[async_trait]
impl MediaResolver for LoopbackResolver {
    async fn resolve(&self, query: &str) -> Result<RemoteMedia, VoiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VoiceError::NoMatches(query.to_string()));
        }
        Ok(RemoteMedia {
            title: query.to_string(),
            uploader: "loopback".to_string(),
            duration: Duration::from_secs(210),
            url: format!("loopback://{}", query.replace(' ', "+")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn track_finishes_after_its_length() {
        let conn = LoopbackConnection::new(GuildId(1));
        conn.connect(ChannelId(10)).await.unwrap();
        conn.play(AudioSource::speech("en", "hello", Some(Duration::from_secs(3))), None)
            .unwrap();
        assert!(conn.is_playing());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!conn.is_playing());
        assert!(conn.current_source().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn paused_track_keeps_its_remaining_time() {
        let conn = LoopbackConnection::new(GuildId(1));
        conn.connect(ChannelId(10)).await.unwrap();
        conn.play(AudioSource::speech("en", "hello", Some(Duration::from_secs(10))), None)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        conn.pause();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(conn.is_paused());

        conn.resume();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(conn.is_playing());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!conn.is_playing());
    }

    #[tokio::test]
    async fn ghost_disconnect_stays_connected() {
        let conn = LoopbackConnection::new(GuildId(1));
        conn.connect(ChannelId(10)).await.unwrap();
        conn.ghost_next_disconnect();

        assert!(conn.disconnect().await.is_ok());
        assert!(conn.is_connected());
        assert!(conn.disconnect().await.is_ok());
        assert!(!conn.is_connected());
        assert_eq!(conn.disconnect_count(), 2);
    }

    #[tokio::test]
    async fn unreachable_guild_does_not_resolve() {
        let directory = LoopbackDirectory::new([GuildId(2), GuildId(1)]);
        assert_eq!(directory.known_guilds().await.unwrap(), vec![GuildId(1), GuildId(2)]);

        directory.set_reachable(GuildId(1), false);
        assert!(directory.resolve(GuildId(1)).is_none());
        directory.set_reachable(GuildId(1), true);
        assert!(directory.resolve(GuildId(1)).is_some());
    }
}
