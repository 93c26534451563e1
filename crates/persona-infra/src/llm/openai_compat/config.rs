//! Configuration types and per-endpoint defaults for OpenAI-compatible providers.
//!
//! Each endpoint that speaks the OpenAI chat completions protocol gets a
//! factory function returning an [`OpenAiCompatConfig`] with the correct base
//! URL and capabilities.

use secrecy::SecretString;

use persona_types::llm::ProviderCapabilities;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`]. Deliberately not
/// `Debug`; the key stays inside [`SecretString`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openrouter", "openai").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Model identifier (e.g., "openai/gpt-3.5-turbo").
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// OpenRouter default configuration.
///
/// Base URL: `https://openrouter.ai/api/v1`
pub fn openrouter_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openrouter".into(),
        base_url: OPENROUTER_BASE_URL.into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            max_context_tokens: 16_385,
            max_output_tokens: 4_096,
        },
    }
}

/// OpenAI default configuration.
///
/// Base URL: `https://api.openai.com/v1`
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    }
}

/// Any other OpenAI-compatible endpoint (self-hosted gateways, local servers).
pub fn custom(base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai_compatible".into(),
        base_url: base_url.trim_end_matches('/').into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            max_context_tokens: 8_192,
            max_output_tokens: 4_096,
        },
    }
}

/// Pick the defaults that match a base URL.
pub fn for_base_url(base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    let normalized = base_url.trim_end_matches('/');
    if normalized == OPENROUTER_BASE_URL {
        openrouter_defaults(api_key, model)
    } else if normalized == OPENAI_BASE_URL {
        openai_defaults(api_key, model)
    } else {
        custom(normalized, api_key, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn key() -> SecretString {
        SecretString::from("sk-test".to_string())
    }

    #[test]
    fn test_openrouter_defaults() {
        let config = openrouter_defaults(key(), "openai/gpt-3.5-turbo");
        assert_eq!(config.provider_name, "openrouter");
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.model, "openai/gpt-3.5-turbo");
        assert_eq!(config.api_key.expose_secret(), "sk-test");
        assert!(config.capabilities.streaming);
    }

    #[test]
    fn test_for_base_url_recognizes_known_endpoints() {
        assert_eq!(
            for_base_url("https://openrouter.ai/api/v1/", key(), "m").provider_name,
            "openrouter"
        );
        assert_eq!(
            for_base_url("https://api.openai.com/v1", key(), "m").provider_name,
            "openai"
        );

        let other = for_base_url("http://localhost:11434/v1/", key(), "llama3");
        assert_eq!(other.provider_name, "openai_compatible");
        assert_eq!(other.base_url, "http://localhost:11434/v1");
    }
}
