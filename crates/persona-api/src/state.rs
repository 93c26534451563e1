//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both the CLI and
//! the REST API. Core services are generic over repository and store traits;
//! AppState pins them to the concrete infra implementations.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use persona_core::cache::ResponseCache;
use persona_core::chat::context::{ContextConfig, ContextManager};
use persona_core::chat::engine::{ChatEngine, EngineConfig};
use persona_core::health::{HealthReporter, ServiceFacts};
use persona_core::llm::box_provider::BoxLlmProvider;
use persona_core::metrics::PerformanceMonitor;
use persona_core::persona::PersonaService;
use persona_infra::filesystem::persona::FilePersonaStore;
use persona_infra::llm::create_provider;
use persona_infra::sqlite::conversation::SqliteConversationRepository;
use persona_infra::sqlite::pool::DatabasePool;
use persona_types::config::ChatConfig;

use crate::http::error::AppError;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatEngine = ChatEngine<SqliteConversationRepository>;

pub type ConcretePersonaService = PersonaService<FilePersonaStore>;

pub type ConcreteHealthReporter = HealthReporter<SqliteConversationRepository>;

/// Shared application state.
///
/// `engine` is `None` when no API key was configured; chat routes answer 503
/// while every other route keeps working.
#[derive(Clone)]
pub struct AppState {
    pub repo: SqliteConversationRepository,
    pub persona_service: Arc<ConcretePersonaService>,
    pub engine: Option<ConcreteChatEngine>,
    pub health: Arc<ConcreteHealthReporter>,
    pub cache: Arc<ResponseCache>,
    pub metrics: Arc<PerformanceMonitor>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize from resolved configuration: open the store, load the
    /// persona, and build the provider when a key is present.
    pub async fn init(config: &ChatConfig, api_key: Option<SecretString>) -> anyhow::Result<Self> {
        let provider = match api_key {
            Some(key) => Some(create_provider(&config.llm, key)),
            None => {
                warn!("OPENAI_API_KEY is not set; chat endpoints will answer 503");
                None
            }
        };
        Self::with_provider(config, provider).await
    }

    /// Wire state around an already-built provider (or none).
    pub async fn with_provider(
        config: &ChatConfig,
        provider: Option<BoxLlmProvider>,
    ) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&config.database_url).await?;
        let repo = SqliteConversationRepository::new(db_pool.clone());

        let persona_service =
            PersonaService::load(FilePersonaStore::new(&config.persona_file)).await;
        let persona = persona_service.persona();

        let cache = Arc::new(ResponseCache::new(config.cache.max_entries));
        let metrics = Arc::new(PerformanceMonitor::new());

        let facts = ServiceFacts {
            model: config.llm.model.clone(),
            persona_source: persona_service.location(),
            credentials_present: provider.is_some(),
        };
        let health = HealthReporter::new(
            repo.clone(),
            Arc::clone(&persona),
            Arc::clone(&cache),
            Arc::clone(&metrics),
            facts,
            Duration::from_millis(config.health.check_timeout_ms),
        );

        let engine = provider.map(|provider| {
            ChatEngine::new(
                repo.clone(),
                provider,
                persona,
                Arc::clone(&cache),
                Arc::clone(&metrics),
                ContextManager::new(ContextConfig::from(&config.context)),
                EngineConfig::from(&config.llm),
            )
        });

        Ok(Self {
            repo,
            persona_service: Arc::new(persona_service),
            engine,
            health: Arc::new(health),
            cache,
            metrics,
            db_pool,
        })
    }

    /// The chat engine, or 503 when none is configured.
    pub fn engine(&self) -> Result<&ConcreteChatEngine, AppError> {
        self.engine.as_ref().ok_or(AppError::EngineUnavailable)
    }
}
