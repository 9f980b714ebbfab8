use std::time::Duration;

use crate::common::types::ChannelId;

/// Failures reported by the voice and messaging collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("not connected to voice")]
    NotConnected,
    #[error("timed out after {0:?} waiting for the voice gateway")]
    Timeout(Duration),
    #[error("voice gateway rejected the request: {0}")]
    Gateway(String),
    #[error("could not deliver message to channel {channel}: {reason}")]
    Delivery { channel: ChannelId, reason: String },
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("could not find media for {0:?}")]
    NoMatches(String),
}

/// Failures while scanning the soundboard directory.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not read sound directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Detected duplicate sound name: {first} vs {second}")]
    Duplicate { first: String, second: String },
}

/// A command the user can't run right now, with the reason shown to them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("You are not in a voice channel")]
    CallerNotInVoice,
    #[error("I need a channel to join")]
    NoTargetChannel,
    #[error("Channel \"{0}\" not found")]
    UnknownChannel(String),
    #[error("I'm already in this channel")]
    AlreadyInChannel,
    #[error("I'm already playing something")]
    AlreadyPlaying,
    #[error("I'm already trying to process a VC command")]
    Busy,
    #[error("I'm not in a voice channel")]
    NotInVoice,
    #[error("I'm not even in a voice channel")]
    NotEvenInVoice,
    #[error("I'm not playing anything")]
    NotPlaying,
    #[error("I'm not paused")]
    NotPaused,
    #[error("You can't pause the soundboard")]
    SoundboardPause,
    #[error("You can't pause/unpause the soundboard")]
    SoundboardResume,
    #[error("I'm not playing any songs at the moment")]
    NoSong,
    #[error("Invalid category/sound name; try `{prefix}sb` with no arguments")]
    UnknownSound { prefix: String },
    #[error("Give me text to speak")]
    NoSpeechText,
    #[error("Invalid language")]
    InvalidLanguage,
    #[error("Give me a search term")]
    NoSearchTerm,
    #[error("That's not a valid integer percentage (0-100)")]
    InvalidVolume,
    #[error("You aren't my owner")]
    NotOwner,
    #[error("I can't see this server's voice state right now")]
    GuildUnavailable,
    #[error("I couldn't find anything for that")]
    NoMatches,
    #[error("Couldn't reload the soundboard ({0})")]
    ReloadFailed(String),
    #[error("Voice isn't cooperating ({0})")]
    Voice(String),
}

impl From<VoiceError> for Denial {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::NotConnected => Self::NotInVoice,
            VoiceError::NoMatches(_) => Self::NoMatches,
            other => Self::Voice(other.to_string()),
        }
    }
}
