use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    commands::{
        context::CommandContext,
        controller::{CommandResult, VoiceController},
        streaks::{ErrorStreaks, scold},
    },
    common::{errors::Denial, types::ChannelId},
};

pub const UNKNOWN_COMMAND: &str = "Invalid command.";

/// Turns chat messages into controller calls and posts the outcome.
pub struct CommandRouter {
    controller: Arc<VoiceController>,
    streaks: ErrorStreaks,
    prefix: String,
}

impl CommandRouter {
    pub fn new(controller: Arc<VoiceController>, prefix: impl Into<String>) -> Self {
        Self {
            controller,
            streaks: ErrorStreaks::new(),
            prefix: prefix.into(),
        }
    }

    pub fn controller(&self) -> &Arc<VoiceController> {
        &self.controller
    }

    pub fn streaks(&self) -> &ErrorStreaks {
        &self.streaks
    }

    /// Returns `false` when `content` isn't addressed to us.
    pub async fn handle(&self, ctx: &CommandContext, content: &str) -> bool {
        let Some(body) = content.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let body = body.trim();
        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (body, None),
        };

        info!("[{}] {} ran {:?}", ctx.guild_id, ctx.author, content);

        let replies = match self.route(ctx, name, args).await {
            Some(Ok(reply)) => {
                let mut replies: Vec<String> = reply.into_iter().collect();
                replies.extend(self.streaks.record_success(ctx.author));
                replies
            }
            Some(Err(denial)) => {
                debug!("[{}] Denied {}: {}", ctx.guild_id, name, denial);
                let mut replies = vec![scold(&denial)];
                replies.extend(self.streaks.record_failure(ctx.author));
                replies
            }
            None => {
                let mut replies = vec![UNKNOWN_COMMAND.to_string()];
                replies.extend(self.streaks.record_failure(ctx.author));
                replies
            }
        };

        for reply in replies {
            if let Err(e) = ctx.channel.send(&reply).await {
                warn!("[{}] Couldn't post reply: {}", ctx.guild_id, e);
            }
        }
        true
    }

    async fn route(
        &self,
        ctx: &CommandContext,
        name: &str,
        args: Option<&str>,
    ) -> Option<CommandResult> {
        let voice = &self.controller;
        let result = match name {
            "join" => match args.map(parse_channel).transpose() {
                Ok(channel) => voice.join(ctx, channel).await,
                Err(denial) => {
                    voice.gate().touch(ctx.guild_id, &ctx.channel);
                    Err(denial)
                }
            },
            "summon" => voice.summon(ctx).await,
            "stop" => voice.stop(ctx).await,
            "leave" => voice.leave(ctx).await,
            "sb" => voice.soundboard(ctx, args).await,
            "say" => voice.say(ctx, args).await,
            "saylang" => {
                let (lang, text) = match args.map(|a| a.split_once(char::is_whitespace)) {
                    None => (None, None),
                    Some(None) => (args, None),
                    Some(Some((lang, text))) => (Some(lang), Some(text)),
                };
                voice.say_in(ctx, lang, text).await
            }
            "play" => voice.play(ctx, args).await,
            "pause" => voice.pause(ctx).await,
            "resume" | "unpause" => voice.resume(ctx).await,
            "playing" | "np" => voice.now_playing(ctx).await,
            "volume" | "vol" => match args.map(str::parse::<i64>).transpose() {
                Ok(percent) => voice.volume(ctx, percent).await,
                Err(_) => {
                    voice.gate().touch(ctx.guild_id, &ctx.channel);
                    Err(Denial::InvalidVolume)
                }
            },
            "reloadsb" | "reload" => voice.reload_sounds(ctx).await,
            "shutdown" => voice.shutdown(ctx).await,
            _ => return None,
        };
        Some(result)
    }
}

/// Accepts a bare id or a `<#id>` mention.
fn parse_channel(arg: &str) -> Result<ChannelId, Denial> {
    let raw = arg
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(arg);
    raw.parse()
        .map_err(|_| Denial::UnknownChannel(arg.to_string()))
}
