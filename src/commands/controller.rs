use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    commands::context::CommandContext,
    common::{
        errors::Denial,
        types::{ChannelId, GuildId, UserId},
    },
    configs::Config,
    session::{CommandGate, LockPolicy},
    soundboard::{SoundCatalog, SoundEntry},
    voice::{
        AudioSource, BoxedConnection, CompletionHook, ConnectionDirectory, MediaResolver,
        SpeechSynthesizer, VoiceConnection,
    },
};

pub const STREAM_FAILURE_NOTICE: &str = "Had an issue while streaming; try again.";

/// Text to post back, if any.
pub type CommandResult = Result<Option<String>, Denial>;

/// Collaborators the controller talks to.
pub struct VoiceServices {
    pub directory: Arc<dyn ConnectionDirectory>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub media: Arc<dyn MediaResolver>,
}

/// The voice command set. Everything that can start, stop, or change
/// playback goes through the [`CommandGate`].
pub struct VoiceController {
    gate: CommandGate,
    services: VoiceServices,
    catalog: RwLock<SoundCatalog>,
    prefix: String,
    owner_id: Option<UserId>,
    default_lang: String,
    shutdown: CancellationToken,
}

impl VoiceController {
    pub fn new(
        gate: CommandGate,
        services: VoiceServices,
        catalog: SoundCatalog,
        config: &Config,
    ) -> Self {
        Self {
            gate,
            services,
            catalog: RwLock::new(catalog),
            prefix: config.bot.prefix.clone(),
            owner_id: config.bot.owner_id,
            default_lang: config.voice.tts_default_lang.clone(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    /// Fires once the owner runs `shutdown`.
    pub fn shutdown_requested(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn require_owner(&self, ctx: &CommandContext) -> Result<(), Denial> {
        if self.owner_id != Some(ctx.author) {
            return Err(Denial::NotOwner);
        }
        Ok(())
    }

    fn connection(&self, guild_id: GuildId) -> Result<BoxedConnection, Denial> {
        self.services
            .directory
            .resolve(guild_id)
            .ok_or(Denial::GuildUnavailable)
    }

    async fn join_channel(
        &self,
        guild_id: GuildId,
        conn: &dyn VoiceConnection,
        target: ChannelId,
    ) -> Result<(), Denial> {
        if conn.is_connected() {
            if conn.current_channel() == Some(target) {
                return Err(Denial::AlreadyInChannel);
            }
            conn.move_to(target).await?;
            info!("[{}] Moved to voice channel {}", guild_id, target);
        } else {
            conn.connect(target).await?;
            info!("[{}] Joined voice channel {}", guild_id, target);
        }
        Ok(())
    }

    /// Joins the author's voice channel. Caller holds the guild lock.
    async fn summon_author(
        &self,
        ctx: &CommandContext,
        conn: &dyn VoiceConnection,
    ) -> Result<(), Denial> {
        let target = ctx.author_voice.ok_or(Denial::CallerNotInVoice)?;
        self.join_channel(ctx.guild_id, conn, target).await
    }

    /// Makes sure we are connected and free to start a new source.
    /// Caller holds the guild lock.
    async fn prepare_to_play(
        &self,
        ctx: &CommandContext,
        conn: &dyn VoiceConnection,
    ) -> Result<(), Denial> {
        if !conn.is_connected() {
            return self.summon_author(ctx, conn).await;
        }
        if conn.is_playing() {
            return Err(Denial::AlreadyPlaying);
        }
        if conn.is_paused() {
            conn.stop();
        }
        Ok(())
    }

    pub async fn join(&self, ctx: &CommandContext, channel: Option<ChannelId>) -> CommandResult {
        let admission = self.gate.admit(ctx.guild_id, &ctx.channel);
        let target = channel.ok_or(Denial::NoTargetChannel)?;

        admission
            .run(LockPolicy::Wait, || async {
                let conn = self.connection(ctx.guild_id)?;
                self.join_channel(ctx.guild_id, conn.as_ref(), target).await
            })
            .await?;
        Ok(None)
    }

    pub async fn summon(&self, ctx: &CommandContext) -> CommandResult {
        self.gate
            .guard(ctx.guild_id, &ctx.channel, LockPolicy::Wait, || async {
                let conn = self.connection(ctx.guild_id)?;
                self.summon_author(ctx, conn.as_ref()).await
            })
            .await?;
        Ok(None)
    }

    pub async fn stop(&self, ctx: &CommandContext) -> CommandResult {
        self.gate.touch(ctx.guild_id, &ctx.channel);
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_connected() {
            return Err(Denial::NotInVoice);
        }
        if !(conn.is_playing() || conn.is_paused()) {
            return Err(Denial::NotPlaying);
        }
        conn.stop();
        Ok(None)
    }

    /// Leaving doesn't count as activity; it clears the record outright.
    pub async fn leave(&self, ctx: &CommandContext) -> CommandResult {
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_connected() {
            return Err(Denial::NotInVoice);
        }

        self.gate.registry().clear(ctx.guild_id);
        if let Err(e) = conn.disconnect().await {
            // The sweeper adopts the connection if it really stayed up
            warn!("[{}] Disconnect on leave failed: {}", ctx.guild_id, e);
            return Err(e.into());
        }
        info!("[{}] Left voice on request", ctx.guild_id);
        Ok(None)
    }

    /// `sb`, `sb all`, `sb <category>`, `sb random`, `sb <sound>`.
    pub async fn soundboard(&self, ctx: &CommandContext, desire: Option<&str>) -> CommandResult {
        let admission = self.gate.admit(ctx.guild_id, &ctx.channel);

        let entry: SoundEntry = {
            let catalog = self.catalog.read();
            let found = match desire {
                None => {
                    let categories: Vec<&str> = catalog.categories().collect();
                    return Ok(Some(format!(
                        "Available categories: {}, all",
                        categories.join(", ")
                    )));
                }
                Some("all") => {
                    let sounds: Vec<&str> = catalog.all_sounds().collect();
                    return Ok(Some(format!("All available sounds:\n{}", sounds.join("\n"))));
                }
                Some(category) if catalog.sounds_in(category).is_some() => {
                    let sounds = catalog.sounds_in(category).unwrap_or_default();
                    return Ok(Some(format!("Category {}: {}", category, sounds.join(", "))));
                }
                Some("random") => catalog.random().cloned(),
                Some(name) => catalog.lookup(name).cloned(),
            };
            found.ok_or_else(|| Denial::UnknownSound {
                prefix: self.prefix.clone(),
            })?
        };

        admission
            .run(LockPolicy::FailFast, || async {
                let conn = self.connection(ctx.guild_id)?;
                self.prepare_to_play(ctx, conn.as_ref()).await?;
                conn.play(entry.to_source(), None)?;
                Ok(())
            })
            .await?;
        Ok(None)
    }

    pub async fn say(&self, ctx: &CommandContext, text: Option<&str>) -> CommandResult {
        let lang = self.default_lang.clone();
        self.say_in(ctx, Some(&lang), text).await
    }

    /// `saylang` lists languages; `saylang <lang> <text>` speaks.
    pub async fn say_in(
        &self,
        ctx: &CommandContext,
        lang: Option<&str>,
        text: Option<&str>,
    ) -> CommandResult {
        let admission = self.gate.admit(ctx.guild_id, &ctx.channel);

        let Some(lang) = lang else {
            let listing: Vec<String> = self
                .services
                .speech
                .languages()
                .into_iter()
                .map(|(code, name)| format!("{}: `{}`", name, code))
                .collect();
            return Ok(Some(format!("Available languages:\n{}", listing.join("\n"))));
        };
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Denial::NoSpeechText)?;
        if !self.services.speech.supports(lang) {
            return Err(Denial::InvalidLanguage);
        }

        let source = self.services.speech.synthesize(text, lang).await?;

        admission
            .run(LockPolicy::FailFast, || async {
                let conn = self.connection(ctx.guild_id)?;
                self.prepare_to_play(ctx, conn.as_ref()).await?;
                conn.play(source, None)?;
                Ok(())
            })
            .await?;
        Ok(None)
    }

    /// Searches for `query` and streams the first match.
    pub async fn play(&self, ctx: &CommandContext, query: Option<&str>) -> CommandResult {
        let admission = self.gate.admit(ctx.guild_id, &ctx.channel);
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(Denial::NoSearchTerm)?;

        let media = admission
            .run(LockPolicy::Wait, || async {
                let conn = self.connection(ctx.guild_id)?;
                self.prepare_to_play(ctx, conn.as_ref()).await?;
                let media = self.services.media.resolve(query).await?;
                conn.play(
                    AudioSource::remote(media.clone()),
                    Some(stream_failure_reporter(ctx)),
                )?;
                Ok(media)
            })
            .await?;

        info!("[{}] Streaming {:?}", ctx.guild_id, media.url);
        Ok(Some(format!("*Now playing:*\n{}", media)))
    }

    pub async fn pause(&self, ctx: &CommandContext) -> CommandResult {
        self.gate.touch(ctx.guild_id, &ctx.channel);
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_playing() {
            return Err(Denial::NotPlaying);
        }
        if !is_remote(conn.as_ref()) {
            return Err(Denial::SoundboardPause);
        }
        conn.pause();
        Ok(None)
    }

    pub async fn resume(&self, ctx: &CommandContext) -> CommandResult {
        self.gate.touch(ctx.guild_id, &ctx.channel);
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_connected() {
            return Err(Denial::NotInVoice);
        }
        if !is_remote(conn.as_ref()) {
            return Err(Denial::SoundboardResume);
        }
        if !conn.is_paused() {
            return Err(Denial::NotPaused);
        }
        conn.resume();
        Ok(None)
    }

    pub async fn now_playing(&self, ctx: &CommandContext) -> CommandResult {
        self.gate.touch(ctx.guild_id, &ctx.channel);
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_connected() {
            return Err(Denial::NotEvenInVoice);
        }

        let active = conn.is_playing() || conn.is_paused();
        match conn.current_source().and_then(|s| s.as_remote().cloned()) {
            Some(media) if active => Ok(Some(format!("*Currently playing:*\n{}", media))),
            _ => Err(Denial::NoSong),
        }
    }

    /// Reports the volume, or sets it to `percent` (0 to 100).
    pub async fn volume(&self, ctx: &CommandContext, percent: Option<i64>) -> CommandResult {
        self.gate.touch(ctx.guild_id, &ctx.channel);
        let conn = self.connection(ctx.guild_id)?;
        if !conn.is_connected() {
            return Err(Denial::NotEvenInVoice);
        }
        if !conn.is_playing() {
            return Err(Denial::NotPlaying);
        }

        let Some(percent) = percent else {
            let current = conn.volume().unwrap_or_default();
            return Ok(Some(format!(
                "Volume is currently at {}%.",
                (current * 100.0).round() as i64
            )));
        };
        if !(0..=100).contains(&percent) {
            return Err(Denial::InvalidVolume);
        }

        conn.set_volume(percent as f32 / 100.0);
        Ok(Some(format!("Volume set to {}%.", percent)))
    }

    /// Rescans the sound directory. Owner only.
    pub async fn reload_sounds(&self, ctx: &CommandContext) -> CommandResult {
        self.require_owner(ctx)?;

        let root = self.catalog.read().root().to_path_buf();
        let fresh = SoundCatalog::load(&root).map_err(|e| {
            error!("Soundboard reload failed: {}", e);
            Denial::ReloadFailed(e.to_string())
        })?;
        *self.catalog.write() = fresh;
        Ok(Some("Done.".to_string()))
    }

    /// Asks the process to stop. Owner only.
    pub async fn shutdown(&self, ctx: &CommandContext) -> CommandResult {
        self.require_owner(ctx)?;

        info!("[{}] Shutdown requested by {}", ctx.guild_id, ctx.author);
        self.shutdown.cancel();
        Ok(Some("okey dokey".to_string()))
    }
}

fn is_remote(conn: &dyn VoiceConnection) -> bool {
    conn.current_source()
        .is_some_and(|source| source.as_remote().is_some())
}

/// Posts a notice to the invoking channel if the stream dies mid-way.
fn stream_failure_reporter(ctx: &CommandContext) -> CompletionHook {
    let guild_id = ctx.guild_id;
    let channel = ctx.channel.clone();
    let runtime = tokio::runtime::Handle::current();

    Box::new(move |failure| {
        let Some(e) = failure else {
            return;
        };
        error!("[{}] Stream failed while playing: {}", guild_id, e);
        runtime.spawn(async move {
            if let Err(e) = channel.send(STREAM_FAILURE_NOTICE).await {
                error!(
                    "[{}] Stream failed and the failure notice couldn't be posted: {}",
                    guild_id, e
                );
            }
        });
    })
}
