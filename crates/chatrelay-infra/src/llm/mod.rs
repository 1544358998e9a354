//! LLM provider implementations.
//!
//! Contains the concrete implementation of the [`LlmProvider`] trait
//! defined in `chatrelay-core`, plus a provider factory ([`create_provider`])
//! that builds it from [`ProviderSettings`] and a connection test
//! ([`test_provider_connection`]) used by `chatrelay check`.
//!
//! [`LlmProvider`]: chatrelay_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use chatrelay_core::llm::box_provider::BoxLlmProvider;
use chatrelay_types::config::ProviderSettings;
use chatrelay_types::error::ConfigError;
use chatrelay_types::llm::{CompletionRequest, CompletionResponse, LlmError, Message, MessageRole};

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::{gemini_defaults, openai_defaults};

/// Create a [`BoxLlmProvider`] from [`ProviderSettings`].
///
/// `settings.name` picks the preset (`"gemini"` or `"openai"`);
/// `settings.base_url`, when set, replaces the preset endpoint.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownProvider`] for any other provider name.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: SecretString,
) -> Result<BoxLlmProvider, ConfigError> {
    let preset = match settings.name.as_str() {
        "gemini" => gemini_defaults(api_key, &settings.model),
        "openai" => openai_defaults(api_key, &settings.model),
        other => return Err(ConfigError::UnknownProvider(other.to_string())),
    };

    let config = match settings.base_url.as_deref() {
        Some(base_url) => preset.with_base_url(base_url),
        None => preset,
    };

    tracing::debug!(
        provider = %config.provider_name,
        model = %config.model,
        base_url = %config.base_url,
        "provider configured"
    );

    Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)))
}

/// Test provider connectivity by sending a minimal completion request.
///
/// Verifies the API key and endpoint with a tiny "Hello" message on a
/// minimal token budget.
///
/// # Errors
///
/// Returns the LLM error if the provider fails to respond.
pub async fn test_provider_connection(
    provider: &BoxLlmProvider,
) -> Result<CompletionResponse, LlmError> {
    let request = CompletionRequest {
        model: String::new(), // Provider uses its configured default
        messages: vec![Message {
            role: MessageRole::User,
            content: "Hello".to_string(),
        }],
        system: None,
        max_tokens: 16,
        temperature: Some(0.0),
        stream: false,
    };
    provider.complete(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(name: &str) -> ProviderSettings {
        ProviderSettings {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_provider_gemini_by_default() {
        let provider =
            create_provider(&ProviderSettings::default(), SecretString::from("k")).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.capabilities().max_context_tokens, 1_000_000);
    }

    #[test]
    fn test_create_provider_openai() {
        let provider = create_provider(&settings("openai"), SecretString::from("k")).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_create_provider_with_base_url_keeps_preset_name() {
        let mut s = settings("gemini");
        s.base_url = Some("http://127.0.0.1:9/v1".to_string());
        let provider = create_provider(&s, SecretString::from("k")).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_create_provider_unknown_name() {
        let result = create_provider(&settings("mystery"), SecretString::from("k"));
        assert!(matches!(result, Err(ConfigError::UnknownProvider(ref n)) if n == "mystery"));
    }
}
