//! Runtime configuration types.
//!
//! `ChatConfig` is the deserialized form of the optional `config.toml`, with
//! environment overrides applied on top by the loader in `persona-infra`.
//! Every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the chat backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Path of the persona text file.
    #[serde(default = "default_persona_file")]
    pub persona_file: String,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub context: ContextSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub health: HealthSettings,
}

fn default_database_url() -> String {
    "sqlite://chatbot.db?mode=rwc".to_string()
}

fn default_persona_file() -> String {
    "persona.txt".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            persona_file: default_persona_file(),
            llm: LlmSettings::default(),
            context: ContextSettings::default(),
            cache: CacheSettings::default(),
            health: HealthSettings::default(),
        }
    }
}

/// Settings for the hosted chat-completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Upper bound on a single LLM call (or on the wait for each stream event).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "cognitivecomputations/dolphin3.0-r1-mistral-24b:free".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Prompt assembly and summarization cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSettings {
    /// How many of the most recent messages are replayed into the prompt.
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,
    /// Estimated token ceiling for replayed history.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// A summary is produced whenever the message count is a multiple of this.
    #[serde(default = "default_summarize_interval")]
    pub summarize_interval: u32,
}

fn default_recent_messages() -> usize {
    20
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_summarize_interval() -> u32 {
    20
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            recent_messages: default_recent_messages(),
            max_context_tokens: default_max_context_tokens(),
            summarize_interval: default_summarize_interval(),
        }
    }
}

/// Response cache sizing. `None` means unbounded, `Some(0)` disables storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Health check behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSettings {
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_check_timeout_ms() -> u64 {
    2000
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_config_default_values() {
        let config = ChatConfig::default();
        assert_eq!(config.context.summarize_interval, 20);
        assert_eq!(config.context.max_context_tokens, 3000);
        assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.persona_file, "persona.txt");
        assert!(config.cache.max_entries.is_none());
    }

    #[test]
    fn test_chat_config_deserialize_empty() {
        let config: ChatConfig = toml::from_str("").unwrap();
        assert_eq!(config, ChatConfig::default());
    }

    #[test]
    fn test_chat_config_deserialize_partial_sections() {
        let toml_str = r#"
persona_file = "/etc/persona/luna.txt"

[llm]
model = "openai/gpt-4o-mini"
timeout_secs = 15

[cache]
max_entries = 500
"#;
        let config: ChatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.persona_file, "/etc/persona/luna.txt");
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.cache.max_entries, Some(500));
        assert_eq!(config.context.summarize_interval, 20);
    }
}
