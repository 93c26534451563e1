//! Startup configuration loader.
//!
//! Reads an optional TOML file into [`ChatConfig`], falling back to defaults
//! when the file is missing or malformed, then layers environment variables
//! on top. The API key is never part of `ChatConfig`; it is resolved
//! separately into a [`SecretString`].

use std::path::Path;
use std::str::FromStr;

use secrecy::SecretString;

use persona_types::config::ChatConfig;
use persona_types::error::ConfigError;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Load configuration from `path`, or defaults when no file was given.
///
/// - Missing file: debug log, defaults.
/// - Unreadable or unparsable file: warning, defaults.
pub async fn load_chat_config(path: Option<&Path>) -> ChatConfig {
    let Some(path) = path else {
        return ChatConfig::default();
    };

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return ChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ChatConfig::default();
        }
    };

    match toml::from_str::<ChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ChatConfig::default()
        }
    }
}

/// Apply environment overrides on top of a file/default config.
///
/// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
/// Empty values are ignored. Unparsable numbers abort with
/// [`ConfigError::InvalidValue`].
pub fn apply_env_overrides<F>(config: &mut ChatConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("LLM_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = get("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = get("PERSONA_FILE_PATH") {
        config.persona_file = v;
    }
    if let Some(v) = get("DATABASE_URL") {
        config.database_url = v;
    }
    if let Some(v) = get("CACHE_MAX_ENTRIES") {
        config.cache.max_entries = Some(parse("CACHE_MAX_ENTRIES", &v)?);
    }
    if let Some(v) = get("SUMMARIZE_INTERVAL") {
        config.context.summarize_interval = parse("SUMMARIZE_INTERVAL", &v)?;
    }
    if let Some(v) = get("CONTEXT_RECENT_MESSAGES") {
        config.context.recent_messages = parse("CONTEXT_RECENT_MESSAGES", &v)?;
    }
    if let Some(v) = get("MAX_CONTEXT_TOKENS") {
        config.context.max_context_tokens = parse("MAX_CONTEXT_TOKENS", &v)?;
    }
    if let Some(v) = get("LLM_MAX_TOKENS") {
        config.llm.max_tokens = parse("LLM_MAX_TOKENS", &v)?;
    }
    if let Some(v) = get("LLM_TEMPERATURE") {
        let temperature: f64 = parse("LLM_TEMPERATURE", &v)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("LLM_TEMPERATURE", &v));
        }
        config.llm.temperature = temperature;
    }
    if let Some(v) = get("LLM_TIMEOUT_SECS") {
        let secs: u64 = parse("LLM_TIMEOUT_SECS", &v)?;
        if secs == 0 {
            return Err(invalid("LLM_TIMEOUT_SECS", &v));
        }
        config.llm.timeout_secs = secs;
    }

    Ok(())
}

/// Read the API key. Absent or blank means no engine.
pub fn api_key_from<F>(lookup: F) -> Option<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(API_KEY_ENV)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
