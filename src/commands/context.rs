use crate::{
    common::types::{ChannelId, GuildId, UserId},
    voice::BoxedChannel,
};

/// Everything a voice command needs to know about who asked and where.
#[derive(Clone)]
pub struct CommandContext {
    pub guild_id: GuildId,
    /// Text channel the command was typed in. Replies go here.
    pub channel: BoxedChannel,
    pub author: UserId,
    /// The author's current voice channel, if they are in one.
    pub author_voice: Option<ChannelId>,
}
