use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub bot: BotConfig,
  #[serde(default)]
  pub voice: VoiceConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  pub fn load() -> AnyResult<Self> {
    let config_path = if Path::new("config.toml").exists() {
      "config.toml"
    } else if Path::new("config.default.toml").exists() {
      "config.default.toml"
    } else {
      return Err("config.toml or config.default.toml not found".into());
    };

    crate::log_println!("Loading configuration from: {}", config_path);

    let config_str = std::fs::read_to_string(config_path)?;
    Self::parse(&config_str)
  }

  pub fn parse(config_str: &str) -> AnyResult<Self> {
    let config: Config = toml::from_str(config_str)?;
    Ok(config)
  }
}
