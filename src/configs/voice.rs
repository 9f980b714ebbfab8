use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
    /// Minutes without a voice command before the bot leaves the channel.
    #[serde(default = "default_idle_timeout_mins")]
    pub idle_timeout_mins: u64,
    /// Seconds between inactivity sweeps.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_sound_dir")]
    pub sound_dir: String,
    #[serde(default = "default_tts_lang")]
    pub tts_default_lang: String,
}

impl VoiceConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_mins * 60)
    }

    pub fn check_interval(&self) -> Duration {
        // never zero
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            idle_timeout_mins: default_idle_timeout_mins(),
            check_interval_secs: default_check_interval_secs(),
            sound_dir: default_sound_dir(),
            tts_default_lang: default_tts_lang(),
        }
    }
}

fn default_idle_timeout_mins() -> u64 {
    5
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_sound_dir() -> String {
    "sounds".to_string()
}

fn default_tts_lang() -> String {
    "en-uk".to_string()
}
