use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::{
        errors::VoiceError,
        types::{AnyResult, ChannelId, GuildId},
    },
    voice::source::{AudioSource, CompletionHook, RemoteMedia},
};

pub type BoxedConnection = Arc<dyn VoiceConnection>;
pub type BoxedChannel = Arc<dyn NotificationChannel>;

/// The bot's voice link for a single guild.
///
/// The platform may change this state underneath us at any time (a moderator
/// disconnecting the bot, a gateway resync), so callers re-query instead of
/// caching answers.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn is_connected(&self) -> bool;

    fn current_channel(&self) -> Option<ChannelId>;

    async fn connect(&self, channel: ChannelId) -> Result<(), VoiceError>;

    async fn move_to(&self, channel: ChannelId) -> Result<(), VoiceError>;

    async fn disconnect(&self) -> Result<(), VoiceError>;

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Starts streaming. Fails if not connected or already playing.
    fn play(
        &self,
        source: AudioSource,
        on_completion: Option<CompletionHook>,
    ) -> Result<(), VoiceError>;

    fn pause(&self);

    fn resume(&self);

    /// Ends the current source, playing or paused.
    fn stop(&self);

    fn current_source(&self) -> Option<AudioSource>;

    /// Volume of the current source, 0.0 to 1.0.
    fn volume(&self) -> Option<f32> {
        self.current_source().map(|source| source.volume)
    }

    fn set_volume(&self, volume: f32);
}

/// Looks up per-guild voice connections from the platform client's cache.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// `None` when the guild can't be resolved right now.
    fn resolve(&self, guild_id: GuildId) -> Option<BoxedConnection>;

    /// Every guild the bot belongs to. Used once at startup.
    async fn known_guilds(&self) -> AnyResult<Vec<GuildId>>;
}

/// A text channel the bot can post to.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn id(&self) -> ChannelId;

    async fn send(&self, text: &str) -> Result<(), VoiceError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// `(code, display name)` pairs.
    fn languages(&self) -> Vec<(String, String)>;

    fn supports(&self, lang: &str) -> bool {
        self.languages().iter().any(|(code, _)| code == lang)
    }

    async fn synthesize(&self, text: &str, lang: &str) -> Result<AudioSource, VoiceError>;
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves a URL or search term to its first match.
    async fn resolve(&self, query: &str) -> Result<RemoteMedia, VoiceError>;
}
