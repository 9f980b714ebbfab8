use serde::{Deserialize, Serialize};

use crate::common::types::UserId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    /// Command prefix, e.g. `q.sb airhorn`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// The only user allowed to run owner commands such as `reloadsb`.
    #[serde(default)]
    pub owner_id: Option<UserId>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            owner_id: None,
        }
    }
}

fn default_prefix() -> String {
    "q.".to_string()
}
