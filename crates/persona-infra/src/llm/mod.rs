//! LLM provider implementations.
//!
//! Contains the concrete [`LlmProvider`](persona_core::llm::provider::LlmProvider)
//! used by the chat engine, plus a factory that builds it from settings.

pub mod openai_compat;

use secrecy::SecretString;
use tracing::info;

use persona_core::llm::box_provider::BoxLlmProvider;
use persona_types::config::LlmSettings;

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for the configured endpoint and model.
pub fn create_provider(settings: &LlmSettings, api_key: SecretString) -> BoxLlmProvider {
    let config = openai_compat::config::for_base_url(&settings.base_url, api_key, &settings.model);
    info!(
        provider = %config.provider_name,
        base_url = %config.base_url,
        model = %config.model,
        "LLM provider configured"
    );
    BoxLlmProvider::new(OpenAiCompatibleProvider::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_defaults_to_openrouter() {
        let provider = create_provider(
            &LlmSettings::default(),
            SecretString::from("sk-test".to_string()),
        );
        assert_eq!(provider.name(), "openrouter");
        assert_eq!(provider.default_model(), LlmSettings::default().model);
    }

    #[test]
    fn test_create_provider_custom_base_url() {
        let settings = LlmSettings {
            base_url: "http://localhost:8080/v1".to_string(),
            model: "local-model".to_string(),
            ..LlmSettings::default()
        };
        let provider = create_provider(&settings, SecretString::from("none".to_string()));
        assert_eq!(provider.name(), "openai_compatible");
        assert_eq!(provider.default_model(), "local-model");
    }
}
