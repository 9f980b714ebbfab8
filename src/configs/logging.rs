use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Extra `EnvFilter` directives, comma separated.
    #[serde(default)]
    pub filters: String,
    #[serde(default)]
    pub file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogFileConfig {
    pub path: String,
    #[serde(default = "default_max_lines")]
    pub max_lines: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            filters: String::new(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_max_lines() -> u32 {
    10000
}
