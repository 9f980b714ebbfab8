//! Drives the command router from plain text lines, so the voice layer can be
//! exercised without a chat gateway.
//!
//! Each line reads `<guild> <text-channel> <voice-channel|-> <user> <message>`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::{
    commands::{CommandContext, CommandRouter},
    common::types::{AnyResult, ChannelId, GuildId, UserId},
    voice::{BoxedChannel, loopback::LoopbackChannel},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author_voice: Option<ChannelId>,
    pub author: UserId,
    pub content: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LineError {
    #[error("expected `<guild> <text-channel> <voice-channel|-> <user> <message>`")]
    Incomplete,
    #[error("{field} must be a numeric id, got {value:?}")]
    BadId { field: &'static str, value: String },
}

impl std::str::FromStr for TerminalLine {
    type Err = LineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().splitn(5, char::is_whitespace);
        let mut next = || parts.next().filter(|p| !p.is_empty()).ok_or(LineError::Incomplete);

        let guild = next()?;
        let channel = next()?;
        let voice = next()?;
        let author = next()?;
        let content = next()?.trim().to_string();

        Ok(Self {
            guild_id: parse_id("guild", guild)?,
            channel_id: parse_id("text channel", channel)?,
            author_voice: match voice {
                "-" => None,
                id => Some(parse_id("voice channel", id)?),
            },
            author: parse_id("user", author)?,
            content,
        })
    }
}

fn parse_id<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, LineError> {
    value.parse().map_err(|_| LineError::BadId {
        field,
        value: value.to_string(),
    })
}

pub struct TerminalDriver {
    router: Arc<CommandRouter>,
    channels: DashMap<ChannelId, Arc<LoopbackChannel>>,
}

impl TerminalDriver {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self {
            router,
            channels: DashMap::new(),
        }
    }

    /// Text channels echo whatever the bot posts to them.
    pub fn channel(&self, id: ChannelId) -> Arc<LoopbackChannel> {
        self.channels
            .entry(id)
            .or_insert_with(|| Arc::new(LoopbackChannel::echoing(id)))
            .clone()
    }

    /// Handles lines until `input` ends. Each command runs on its own task
    /// so a slow connect doesn't hold up other guilds.
    pub async fn run<R>(&self, input: R) -> AnyResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut inflight = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed: TerminalLine = match line.parse() {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Ignoring line {:?}: {}", line, e);
                    continue;
                }
            };

            let channel: BoxedChannel = self.channel(parsed.channel_id);
            let ctx = CommandContext {
                guild_id: parsed.guild_id,
                channel,
                author: parsed.author,
                author_voice: parsed.author_voice,
            };
            let router = self.router.clone();
            inflight.retain(|task: &tokio::task::JoinHandle<()>| !task.is_finished());
            inflight.push(tokio::spawn(async move {
                if !router.handle(&ctx, &parsed.content).await {
                    debug!("[{}] Not a command: {:?}", ctx.guild_id, parsed.content);
                }
            }));
        }

        for task in inflight {
            if let Err(e) = task.await {
                warn!("Command task failed: {}", e);
            }
        }
        Ok(())
    }
}
