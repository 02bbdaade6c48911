use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Environment variable that supplies the upstream bearer token.
pub const API_KEY_ENV: &str = "PARLEY_API_KEY";

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. The bearer token is never
/// compiled in; it comes from the file or from `PARLEY_API_KEY`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Take the API key from `PARLEY_API_KEY` when it is set and non-blank.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.upstream.apply_api_key(&key);
        }
    }

    /// Check the configuration before any turn is dispatched.
    pub fn validate(&self) -> Result<()> {
        self.upstream.validate()?;
        if self.chat.max_message_length == 0 {
            return Err(ParleyError::Config(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Caller identifier sent with every upstream request.
    pub user_id: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            user_id: "parley_user".to_string(),
        }
    }
}

/// Upstream conversational service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Conversational endpoint (A). Keeps multi-turn state.
    pub chat_endpoint: String,
    /// Single-turn completion endpoint (B). Stateless.
    pub completion_endpoint: String,
    /// Bearer token. Prefer `PARLEY_API_KEY` over storing it here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Message field name tried first (N1).
    pub primary_message_field: String,
    /// Message field name tried after a rejection (N2).
    pub alternate_message_field: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            chat_endpoint: "https://api.dify.ai/v1/chat-messages".to_string(),
            completion_endpoint: "https://api.dify.ai/v1/completions".to_string(),
            api_key: None,
            timeout_secs: 30,
            primary_message_field: "question".to_string(),
            alternate_message_field: "query".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Replace the API key if `key` is non-blank.
    pub fn apply_api_key(&mut self, key: &str) {
        let key = key.trim();
        if !key.is_empty() {
            self.api_key = Some(key.to_string());
        }
    }

    /// The configured API key, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(ParleyError::Config(format!(
                "no API key configured; set {} or upstream.api_key",
                API_KEY_ENV
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ParleyError::Config(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.chat_endpoint.trim().is_empty() || self.completion_endpoint.trim().is_empty() {
            return Err(ParleyError::Config(
                "upstream endpoints must not be empty".to_string(),
            ));
        }
        let primary = self.primary_message_field.trim();
        let alternate = self.alternate_message_field.trim();
        if primary.is_empty() || alternate.is_empty() {
            return Err(ParleyError::Config(
                "message field names must not be empty".to_string(),
            ));
        }
        if primary == alternate {
            return Err(ParleyError::Config(format!(
                "primary and alternate message fields are both '{}'",
                primary
            )));
        }
        Ok(())
    }
}

/// Chat behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Append the safety disclaimer to answers about medical topics.
    pub medical_disclaimer: bool,
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            medical_disclaimer: true,
            max_message_length: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn valid_config() -> ParleyConfig {
        let mut config = ParleyConfig::default();
        config.upstream.api_key = Some("app-test".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.user_id, "parley_user");
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.upstream.primary_message_field, "question");
        assert_eq!(config.upstream.alternate_message_field, "query");
        assert!(config.upstream.api_key.is_none());
        assert!(config.chat.medical_disclaimer);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
user_id = "clinic-desk"

[upstream]
chat_endpoint = "http://localhost:9000/v1/chat-messages"
completion_endpoint = "http://localhost:9000/v1/completions"
api_key = "app-abc"
timeout_secs = 45

[chat]
medical_disclaimer = false
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.user_id, "clinic-desk");
        assert_eq!(
            config.upstream.chat_endpoint,
            "http://localhost:9000/v1/chat-messages"
        );
        assert_eq!(config.upstream.api_key(), Some("app-abc"));
        assert_eq!(config.upstream.timeout_secs, 45);
        assert!(!config.chat.medical_disclaimer);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_response_mode_is_not_configurable() {
        let content = r#"
[upstream]
api_key = "app-abc"
response_mode = "streaming"
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert!(config.validate().is_ok());
        let saved = toml::to_string(&config).unwrap();
        assert!(!saved.contains("response_mode"));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[upstream]
timeout_secs = 60
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.upstream.timeout_secs, 60);
        assert_eq!(config.upstream.primary_message_field, "question");
        assert_eq!(config.general.user_id, "parley_user");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("upstream = [[[");
        let err = ParleyConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/parley.toml"));
        assert_eq!(config.upstream.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = valid_config();
        config.save(&path).unwrap();

        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.upstream.chat_endpoint, config.upstream.chat_endpoint);
        assert_eq!(reloaded.upstream.api_key(), Some("app-test"));
    }

    #[test]
    fn test_save_omits_missing_api_key() {
        let config = ParleyConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("api_key"));
    }

    // ---- Validation ----

    #[test]
    fn test_validate_missing_api_key() {
        let err = ParleyConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_validate_blank_api_key() {
        let mut config = valid_config();
        config.upstream.api_key = Some("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = valid_config();
        config.upstream.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_endpoint() {
        let mut config = valid_config();
        config.upstream.completion_endpoint = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_identical_field_names() {
        let mut config = valid_config();
        config.upstream.alternate_message_field = "question".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn test_validate_zero_message_length() {
        let mut config = valid_config();
        config.chat.max_message_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_api_key_ignores_blank() {
        let mut upstream = UpstreamConfig::default();
        upstream.apply_api_key("  ");
        assert!(upstream.api_key().is_none());
        upstream.apply_api_key(" app-xyz ");
        assert_eq!(upstream.api_key(), Some("app-xyz"));
    }

    #[test]
    fn test_timeout_duration() {
        let upstream = UpstreamConfig::default();
        assert_eq!(upstream.timeout(), std::time::Duration::from_secs(30));
    }
}
