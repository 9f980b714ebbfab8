#![allow(dead_code)]

use std::{fs, sync::Arc};

use soundbooth::{
    commands::{CommandContext, CommandRouter, VoiceController, VoiceServices},
    common::types::{ChannelId, GuildId, UserId},
    configs::Config,
    session::{CommandGate, SessionRegistry},
    soundboard::SoundCatalog,
    voice::{
        BoxedChannel,
        loopback::{
            LoopbackChannel, LoopbackConnection, LoopbackDirectory, LoopbackResolver,
            LoopbackSynthesizer,
        },
    },
};
use tempfile::TempDir;

pub const GUILD: GuildId = GuildId(1);
pub const OTHER_GUILD: GuildId = GuildId(2);
pub const TEXT: ChannelId = ChannelId(100);
pub const VOICE: ChannelId = ChannelId(200);
pub const OWNER: UserId = UserId(1);
pub const MEMBER: UserId = UserId(2);

/// `<category>/<name>.mp3` files under a fresh temp dir.
pub fn sound_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"ID3").unwrap();
    }
    dir
}

pub struct Harness {
    pub directory: Arc<LoopbackDirectory>,
    pub registry: Arc<SessionRegistry>,
    pub controller: Arc<VoiceController>,
    pub router: CommandRouter,
    pub text: Arc<LoopbackChannel>,
    pub sounds: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let directory = Arc::new(LoopbackDirectory::new([GUILD, OTHER_GUILD]));
        let registry = Arc::new(SessionRegistry::new());
        registry.initialize([GUILD, OTHER_GUILD]);

        let sounds = sound_dir(&[
            "memes/airhorn.mp3",
            "memes/bruh.mp3",
            "anime/nani.mp3",
        ]);
        let catalog = SoundCatalog::load(sounds.path()).unwrap();

        let mut config = Config::default();
        config.bot.owner_id = Some(OWNER);

        let controller = Arc::new(VoiceController::new(
            CommandGate::new(registry.clone()),
            VoiceServices {
                directory: directory.clone(),
                speech: Arc::new(LoopbackSynthesizer),
                media: Arc::new(LoopbackResolver),
            },
            catalog,
            &config,
        ));
        let router = CommandRouter::new(controller.clone(), config.bot.prefix.clone());

        Self {
            directory,
            registry,
            controller,
            router,
            text: Arc::new(LoopbackChannel::new(TEXT)),
            sounds,
        }
    }

    pub fn conn(&self) -> Arc<LoopbackConnection> {
        self.directory.connection(GUILD).unwrap()
    }

    /// A member of `GUILD` sitting in `VOICE`.
    pub fn ctx(&self) -> CommandContext {
        self.ctx_as(MEMBER, Some(VOICE))
    }

    pub fn ctx_as(&self, author: UserId, author_voice: Option<ChannelId>) -> CommandContext {
        let channel: BoxedChannel = self.text.clone();
        CommandContext {
            guild_id: GUILD,
            channel,
            author,
            author_voice,
        }
    }
}
