use crate::constants::{
    CHAT_API_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, IMAGE_API_BASE_URL,
};
use crate::errors::{LuminaError, LuminaResult};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

/// Application configuration. Loaded once at startup and passed explicitly to
/// whichever component needs it; there is no global config state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chat_api_key: String,
    pub chat_api_url: String,
    pub chat_model: String,
    pub image_api_key: String,
    pub image_api_url: String,
    pub image_model: String,
    pub db_path: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_api_key: String::new(),
            chat_api_url: CHAT_API_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_api_key: String::new(),
            image_api_url: IMAGE_API_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            db_path: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads the config file, creating it with defaults on first run.
    /// Credentials found in the environment override the file either way.
    pub fn load() -> LuminaResult<Self> {
        let config_path = config_path()?;

        let mut config = if config_path.exists() {
            let config_str = fs::read_to_string(&config_path).map_err(|e| {
                LuminaError::config_error(format!("Failed to read config file: {}", e))
            })?;

            serde_json::from_str(&config_str)
                .map_err(|e| LuminaError::config_error(format!("Failed to parse config: {}", e)))?
        } else {
            let config = Config::default();

            fs::create_dir_all(config_path.parent().unwrap()).map_err(|e| {
                LuminaError::config_error(format!("Failed to create config directory: {}", e))
            })?;

            let config_str = serde_json::to_string_pretty(&config).map_err(|e| {
                LuminaError::config_error(format!("Failed to serialize config: {}", e))
            })?;

            fs::write(&config_path, config_str).map_err(|e| {
                LuminaError::config_error(format!("Failed to write config file: {}", e))
            })?;

            config
        };

        if let Ok(key) = env::var("GEMINI_API_KEY") {
            config.chat_api_key = key;
        }
        if let Ok(key) = env::var("IMAGE_API_KEY") {
            config.image_api_key = key;
        }
        if config.db_path.is_empty() {
            config.db_path = default_db_path()?.to_string_lossy().to_string();
        }

        config.validate()?;

        Ok(config)
    }

    /// The chat credential is required; the app cannot start without the chat
    /// feature. The image credential is optional and only gates the panel.
    pub fn validate(&self) -> LuminaResult<()> {
        if self.chat_api_key.is_empty() {
            return Err(LuminaError::config_error(
                "Chat API key is required (set GEMINI_API_KEY or edit the config file)",
            ));
        }

        if self.chat_model.is_empty() {
            return Err(LuminaError::config_error("Chat model name is required"));
        }

        if self.image_model.is_empty() {
            return Err(LuminaError::config_error("Image model name is required"));
        }

        if self.db_path.is_empty() {
            return Err(LuminaError::config_error("Database path is required"));
        }

        Ok(())
    }

    pub fn image_feature_enabled(&self) -> bool {
        !self.image_api_key.is_empty()
    }
}

fn config_path() -> LuminaResult<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| LuminaError::config_error("Could not determine home directory"))?;

    Ok(home_dir.join(".config").join("lumina").join("config.json"))
}

fn default_db_path() -> LuminaResult<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| LuminaError::config_error("Could not determine data directory"))?;

    Ok(data_dir.join("lumina").join("lumina.sqlite"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_config() -> Config {
        Config {
            chat_api_key: "test-chat-key".to_string(),
            image_api_key: "test-image-key".to_string(),
            db_path: "lumina.sqlite".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_config_valid() {
        assert!(populated_config().validate().is_ok());
    }

    #[test]
    fn test_validate_config_missing_chat_key() {
        let mut config = populated_config();
        config.chat_api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_image_key_disables_panel_only() {
        let mut config = populated_config();
        config.image_api_key = String::new();
        assert!(config.validate().is_ok());
        assert!(!config.image_feature_enabled());
    }

    #[test]
    fn test_validate_config_missing_model() {
        let mut config = populated_config();
        config.chat_model = String::new();
        assert!(config.validate().is_err());
    }
}
