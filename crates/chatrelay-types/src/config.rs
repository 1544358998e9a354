//! Configuration types for chatrelay.
//!
//! `RelayConfig` represents the top-level `config.toml` that controls the
//! system instruction, history bounds, session eviction, and the provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the relay.
///
/// Loaded from `~/.chatrelay/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Instruction placed ahead of every conversation sent to the provider.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum turns retained per session after each assistant completion.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Session used by callers that do not send a session id.
    #[serde(default = "default_fallback_session_id")]
    pub fallback_session_id: String,

    /// Maximum number of live sessions; `0` disables the cap.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions idle longer than this many seconds are evicted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_idle_ttl_secs: Option<u64>,

    /// Fragments buffered between the provider task and the HTTP body.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Directory holding the static chat client.
    #[serde(default = "default_web_dir")]
    pub web_dir: String,

    #[serde(default)]
    pub provider: ProviderSettings,
}

impl RelayConfig {
    /// Idle TTL as a `Duration`, if configured.
    pub fn session_idle_ttl(&self) -> Option<Duration> {
        self.session_idle_ttl_secs.map(Duration::from_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_turns: default_max_turns(),
            fallback_session_id: default_fallback_session_id(),
            max_sessions: default_max_sessions(),
            session_idle_ttl_secs: None,
            stream_buffer: default_stream_buffer(),
            web_dir: default_web_dir(),
            provider: ProviderSettings::default(),
        }
    }
}

/// Fixed provider selection. Callers never choose the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider preset: "gemini" or "openai".
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Override the preset's base URL (proxies, local gateways).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_max_turns() -> usize {
    30
}

fn default_fallback_session_id() -> String {
    "default".to_string()
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_stream_buffer() -> usize {
    1
}

fn default_web_dir() -> String {
    "web".to_string()
}

fn default_provider_name() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_GENERATIVE_AI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    8_192
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.system_prompt, "You are a helpful assistant.");
        assert_eq!(config.max_turns, 30);
        assert_eq!(config.fallback_session_id, "default");
        assert_eq!(config.max_sessions, 10_000);
        assert!(config.session_idle_ttl().is_none());
        assert_eq!(config.stream_buffer, 1);
        assert_eq!(config.provider.name, "gemini");
        assert_eq!(config.provider.model, "gemini-2.5-flash");
        assert_eq!(config.provider.api_key_env, "GOOGLE_GENERATIVE_AI_API_KEY");
    }

    #[test]
    fn test_relay_config_deserialize_empty() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_relay_config_deserialize_with_values() {
        let toml_str = r#"
system_prompt = "Answer tersely."
max_turns = 10
session_idle_ttl_secs = 600

[provider]
name = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.2
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.system_prompt, "Answer tersely.");
        assert_eq!(config.max_turns, 10);
        assert_eq!(config.session_idle_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.fallback_session_id, "default");
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.max_tokens, 8_192);
        assert_eq!(config.provider.temperature, Some(0.2));
    }

    #[test]
    fn test_relay_config_toml_roundtrip() {
        let config = RelayConfig {
            max_sessions: 0,
            session_idle_ttl_secs: Some(60),
            ..Default::default()
        };
        let rendered = toml::to_string(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
