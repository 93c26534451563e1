//! Persona text shared by every conversation.
//!
//! `Persona` is the process-wide system-prompt text. It is resolved once at
//! composition time through a [`PersonaStore`] and swapped in place on update
//! or refresh, so readers never see a half-written value.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{info, warn};

use persona_types::error::PersonaError;

/// Persona used when the store has nothing to offer.
pub const DEFAULT_PERSONA: &str = "You are a helpful and friendly AI assistant.";

/// Minimum trimmed length accepted for a persona update.
pub const MIN_PERSONA_CHARS: usize = 10;

/// Backing store for persona text.
///
/// Implementations live in persona-infra (e.g., `FilePersonaStore`).
pub trait PersonaStore: Send + Sync {
    /// Read the full persona text.
    fn load(&self) -> impl std::future::Future<Output = Result<String, PersonaError>> + Send;

    /// Replace the persona text.
    fn save(
        &self,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), PersonaError>> + Send;

    /// Human-readable location, for status output.
    fn location(&self) -> String;
}

/// Shared persona text plus whether it came from the store.
#[derive(Debug)]
pub struct Persona {
    text: RwLock<String>,
    loaded: AtomicBool,
}

impl Persona {
    /// A persona that was successfully read from its store.
    pub fn loaded(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
            loaded: AtomicBool::new(true),
        }
    }

    /// The built-in fallback persona.
    pub fn fallback() -> Self {
        Self {
            text: RwLock::new(DEFAULT_PERSONA.to_string()),
            loaded: AtomicBool::new(false),
        }
    }

    pub async fn current(&self) -> String {
        self.text.read().await.clone()
    }

    /// Whether the current text came from the store rather than the fallback.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    async fn replace(&self, text: String) {
        *self.text.write().await = text;
        self.loaded.store(true, Ordering::Relaxed);
    }
}

/// Validate persona text before it is stored.
pub fn validate_persona(content: &str) -> Result<(), PersonaError> {
    let trimmed = content.trim();
    if trimmed.chars().count() < MIN_PERSONA_CHARS {
        return Err(PersonaError::InvalidContent(format!(
            "persona must be at least {MIN_PERSONA_CHARS} characters"
        )));
    }
    Ok(())
}

/// Loads, updates, and refreshes the shared [`Persona`].
pub struct PersonaService<S: PersonaStore> {
    store: S,
    persona: Arc<Persona>,
}

impl<S: PersonaStore> PersonaService<S> {
    /// Read the store once and build the shared persona.
    ///
    /// A missing or unreadable source logs a warning and falls back to
    /// [`DEFAULT_PERSONA`] instead of failing startup.
    pub async fn load(store: S) -> Self {
        let persona = match store.load().await {
            Ok(text) if !text.trim().is_empty() => {
                info!(source = %store.location(), "Persona loaded");
                Persona::loaded(text.trim().to_string())
            }
            Ok(_) => {
                warn!(source = %store.location(), "Persona source is empty, using default persona");
                Persona::fallback()
            }
            Err(e) => {
                warn!(source = %store.location(), error = %e, "Persona unavailable, using default persona");
                Persona::fallback()
            }
        };

        Self {
            store,
            persona: Arc::new(persona),
        }
    }

    /// The shared persona handle given to the chat engine.
    pub fn persona(&self) -> Arc<Persona> {
        Arc::clone(&self.persona)
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Validate, persist, then swap in new persona text.
    pub async fn update(&self, content: &str) -> Result<(), PersonaError> {
        validate_persona(content)?;
        let text = content.trim().to_string();
        self.store.save(&text).await?;
        self.persona.replace(text).await;
        info!(source = %self.store.location(), "Persona updated");
        Ok(())
    }

    /// Re-read the store. On failure the current text is kept.
    pub async fn refresh(&self) -> Result<(), PersonaError> {
        let text = self.store.load().await?;
        validate_persona(&text)?;
        self.persona.replace(text.trim().to_string()).await;
        info!(source = %self.store.location(), "Persona refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemoryStore {
        content: Mutex<Option<String>>,
    }

    impl MemoryStore {
        fn with(content: Option<&str>) -> Self {
            Self {
                content: Mutex::new(content.map(str::to_string)),
            }
        }
    }

    impl PersonaStore for MemoryStore {
        async fn load(&self) -> Result<String, PersonaError> {
            self.content
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| PersonaError::NotFound("memory".to_string()))
        }

        async fn save(&self, content: &str) -> Result<(), PersonaError> {
            *self.content.lock().unwrap() = Some(content.to_string());
            Ok(())
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    #[tokio::test]
    async fn test_missing_source_falls_back_to_default() {
        let service = PersonaService::load(MemoryStore::with(None)).await;
        let persona = service.persona();
        assert_eq!(persona.current().await, DEFAULT_PERSONA);
        assert!(!persona.is_loaded());
    }

    #[tokio::test]
    async fn test_loaded_persona_is_trimmed() {
        let service =
            PersonaService::load(MemoryStore::with(Some("  You are Luna, a stargazer.\n"))).await;
        assert_eq!(service.persona().current().await, "You are Luna, a stargazer.");
        assert!(service.persona().is_loaded());
    }

    #[tokio::test]
    async fn test_update_rejects_short_content() {
        let service = PersonaService::load(MemoryStore::with(Some("You are Luna, a stargazer."))).await;
        let err = service.update("   short  ").await.unwrap_err();
        assert!(matches!(err, PersonaError::InvalidContent(_)));
        assert_eq!(service.persona().current().await, "You are Luna, a stargazer.");
    }

    #[tokio::test]
    async fn test_update_writes_through_and_swaps() {
        let service = PersonaService::load(MemoryStore::with(None)).await;
        let persona = service.persona();

        service.update("You are Orion, a patient tutor.").await.unwrap();

        assert_eq!(persona.current().await, "You are Orion, a patient tutor.");
        assert!(persona.is_loaded());
        assert_eq!(
            service.store.load().await.unwrap(),
            "You are Orion, a patient tutor."
        );
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_change() {
        let service = PersonaService::load(MemoryStore::with(Some("You are Luna, a stargazer."))).await;
        service
            .store
            .save("You are Vega, a travel planner.")
            .await
            .unwrap();

        service.refresh().await.unwrap();
        assert_eq!(
            service.persona().current().await,
            "You are Vega, a travel planner."
        );
    }

    #[test]
    fn test_validate_persona_boundary() {
        assert!(validate_persona("0123456789").is_ok());
        assert!(validate_persona("012345678").is_err());
    }
}
