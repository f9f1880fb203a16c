//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub modules: ModulesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    /// Storage location; omit to run on in-memory storage only
    pub data_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModulesConfig {
    /// Builtin modules that should not be loaded
    pub disabled: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "modubot".to_string(),
                data_path: Some(PathBuf::from("data/modubot.db")),
            },
            modules: ModulesConfig { disabled: vec![] },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(name) = std::env::var("BOT_NAME") {
            config.bot.name = name;
        }

        if let Ok(path) = std::env::var("BOT_DATA_PATH") {
            if path.is_empty() {
                config.bot.data_path = None;
            } else {
                config.bot.data_path = Some(PathBuf::from(path));
            }
        }

        config
    }

    pub fn save(&self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.into(), content)?;
        Ok(())
    }

    pub fn is_module_enabled(&self, name: &str) -> bool {
        !self.modules.disabled.iter().any(|disabled| disabled == name)
    }
}
