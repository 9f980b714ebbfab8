use std::{fmt, path::PathBuf, time::Duration};

use crate::common::errors::VoiceError;

/// Called once when playback ends; `Some` if the stream failed.
pub type CompletionHook = Box<dyn FnOnce(Option<VoiceError>) + Send + 'static>;

/// A track found by searching or extracting a remote URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMedia {
    pub title: String,
    pub uploader: String,
    pub duration: Duration,
    pub url: String,
}

impl fmt::Display for RemoteMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.duration.as_secs();
        write!(
            f,
            "{}\nuploaded by {}\n[{}m {}s]",
            self.title,
            self.uploader,
            secs / 60,
            secs % 60
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Soundboard {
        category: String,
        name: String,
        path: PathBuf,
    },
    Speech {
        lang: String,
        text: String,
    },
    Remote(RemoteMedia),
}

/// Something the voice connection can stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    pub kind: SourceKind,
    /// Linear gain, 0.0 to 1.0.
    pub volume: f32,
    /// Known length, if any.
    pub duration: Option<Duration>,
}

impl AudioSource {
    pub fn soundboard(category: &str, name: &str, path: PathBuf) -> Self {
        Self {
            kind: SourceKind::Soundboard {
                category: category.to_string(),
                name: name.to_string(),
                path,
            },
            volume: 0.5,
            duration: None,
        }
    }

    pub fn speech(lang: &str, text: &str, duration: Option<Duration>) -> Self {
        Self {
            kind: SourceKind::Speech {
                lang: lang.to_string(),
                text: text.to_string(),
            },
            volume: 1.0,
            duration,
        }
    }

    pub fn remote(media: RemoteMedia) -> Self {
        let duration = Some(media.duration);
        Self {
            kind: SourceKind::Remote(media),
            volume: 0.5,
            duration,
        }
    }

    /// Only remote media can be paused, resumed, or described.
    pub fn as_remote(&self) -> Option<&RemoteMedia> {
        match &self.kind {
            SourceKind::Remote(media) => Some(media),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_media_display() {
        let media = RemoteMedia {
            title: "Never Gonna Give You Up".to_string(),
            uploader: "Rick Astley".to_string(),
            duration: Duration::from_secs(212),
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        };
        assert_eq!(
            media.to_string(),
            "Never Gonna Give You Up\nuploaded by Rick Astley\n[3m 32s]"
        );
    }

    #[test]
    fn default_volumes() {
        assert_eq!(AudioSource::soundboard("memes", "airhorn", PathBuf::new()).volume, 0.5);
        assert_eq!(AudioSource::speech("en", "hi", None).volume, 1.0);
        assert!(AudioSource::speech("en", "hi", None).as_remote().is_none());
    }
}
