use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MotoError, Result};

/// Environment variable holding the generative-language API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable holding the conversational voice agent id.
pub const AGENT_ID_ENV: &str = "ELEVENLABS_AGENT_ID";

/// Top-level configuration for the Moto application.
///
/// Loaded from `~/.moto/config.toml` by default. Secrets are never part of
/// the file; they are resolved from the environment by [`Settings::resolve`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl MotoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MotoConfig = toml::from_str(&content)?;
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
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Text generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model name passed on every request.
    pub model: String,
    /// Base URL of the Generative Language REST API.
    pub endpoint: String,
    /// TCP connect timeout in seconds. `0`, the default, sets no deadline.
    pub connect_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            connect_timeout_secs: 0,
        }
    }
}

/// Streaming transport used for the voice session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTransport {
    #[default]
    Websocket,
    Webrtc,
}

impl fmt::Display for VoiceTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceTransport::Websocket => write!(f, "websocket"),
            VoiceTransport::Webrtc => write!(f, "webrtc"),
        }
    }
}

/// Voice agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// WebSocket endpoint of the conversational agent service.
    pub endpoint: String,
    /// Transport preference sent with every session start.
    pub transport: VoiceTransport,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://api.elevenlabs.io/v1/convai/conversation".to_string(),
            transport: VoiceTransport::Websocket,
        }
    }
}

// =============================================================================
// Resolved runtime settings
// =============================================================================

/// Everything the text pipeline needs, resolved once at startup.
#[derive(Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Everything the voice controller needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub agent_id: String,
    pub endpoint: String,
    pub transport: VoiceTransport,
}

/// Runtime settings injected into the engine components.
#[derive(Debug, Clone)]
pub struct Settings {
    pub generation: GenerationSettings,
    pub voice: VoiceSettings,
}

impl Settings {
    /// Combine the file configuration with secrets from `lookup`.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`. A missing or blank
    /// API key or agent id is a startup misconfiguration.
    pub fn resolve<F>(config: &MotoConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, API_KEY_ENV)?;
        let agent_id = required(&lookup, AGENT_ID_ENV)?;

        Ok(Self {
            generation: GenerationSettings {
                model: config.generation.model.clone(),
                endpoint: config.generation.endpoint.trim_end_matches('/').to_string(),
                api_key,
                connect_timeout_secs: config.generation.connect_timeout_secs,
            },
            voice: VoiceSettings {
                agent_id,
                endpoint: config.voice.endpoint.clone(),
                transport: config.voice.transport,
            },
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(MotoError::Config(format!("{} is not set", key))),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = MotoConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.generation.model, "gemini-2.5-flash");
        assert_eq!(
            config.generation.endpoint,
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(config.generation.connect_timeout_secs, 0);
        assert_eq!(
            config.voice.endpoint,
            "wss://api.elevenlabs.io/v1/convai/conversation"
        );
        assert_eq!(config.voice.transport, VoiceTransport::Websocket);
    }

    #[test]
    fn test_config_load_partial() {
        let content = r#"
[generation]
model = "gemini-2.0-pro"

[voice]
transport = "webrtc"
"#;
        let file = create_temp_config(content);
        let config = MotoConfig::load(file.path()).unwrap();
        assert_eq!(config.generation.model, "gemini-2.0-pro");
        // Unspecified fields fall back to defaults
        assert_eq!(config.generation.connect_timeout_secs, 0);
        assert_eq!(config.voice.transport, VoiceTransport::Webrtc);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = MotoConfig::load(file.path()).unwrap();
        assert_eq!(config.generation.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = MotoConfig::load(file.path());
        assert!(matches!(result, Err(MotoError::Config(_))));
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let config = MotoConfig::load_or_default(Path::new("/nonexistent/moto/config.toml"));
        assert_eq!(config.generation.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = MotoConfig::default();
        config.general.log_level = "debug".to_string();
        config.save(&path).unwrap();

        let reloaded = MotoConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.log_level, "debug");
    }

    #[test]
    fn test_settings_resolve() {
        let vars = env(&[(API_KEY_ENV, "key-123"), (AGENT_ID_ENV, " agent_abc ")]);
        let mut config = MotoConfig::default();
        config.generation.endpoint = "http://localhost:9000/".to_string();

        let settings = Settings::resolve(&config, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(settings.generation.api_key, "key-123");
        assert_eq!(settings.generation.endpoint, "http://localhost:9000");
        assert_eq!(settings.generation.model, "gemini-2.5-flash");
        assert_eq!(settings.voice.agent_id, "agent_abc");
        assert_eq!(settings.voice.transport, VoiceTransport::Websocket);
    }

    #[test]
    fn test_settings_missing_api_key() {
        let vars = env(&[(AGENT_ID_ENV, "agent_abc")]);
        let err = Settings::resolve(&MotoConfig::default(), |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, MotoError::Config(_)));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_settings_blank_agent_id() {
        let vars = env(&[(API_KEY_ENV, "key"), (AGENT_ID_ENV, "   ")]);
        let err = Settings::resolve(&MotoConfig::default(), |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains(AGENT_ID_ENV));
    }

    #[test]
    fn test_generation_settings_debug_redacts_key() {
        let vars = env(&[(API_KEY_ENV, "super-secret"), (AGENT_ID_ENV, "a")]);
        let settings = Settings::resolve(&MotoConfig::default(), |k| vars.get(k).cloned()).unwrap();
        let dbg = format!("{:?}", settings);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(VoiceTransport::Websocket.to_string(), "websocket");
        assert_eq!(VoiceTransport::Webrtc.to_string(), "webrtc");
    }
}
