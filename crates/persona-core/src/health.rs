//! Service health and status reporting.
//!
//! `HealthReporter` runs the database, credential, and persona checks
//! concurrently, each bounded by its own timeout, and folds them into a
//! [`HealthReport`]. A failing or slow check degrades only its own component.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use persona_types::status::{ComponentHealth, HealthReport, StorageTotals, SystemStatus};

use crate::cache::ResponseCache;
use crate::chat::repository::ConversationRepository;
use crate::metrics::PerformanceMonitor;
use crate::persona::Persona;

pub const DATABASE_COMPONENT: &str = "database";
pub const CREDENTIALS_COMPONENT: &str = "llm_credentials";
pub const PERSONA_COMPONENT: &str = "persona";

/// Static facts about the running service the reporter includes verbatim.
#[derive(Debug, Clone)]
pub struct ServiceFacts {
    pub model: String,
    pub persona_source: String,
    /// Whether an API key was configured (and so the engine exists).
    pub credentials_present: bool,
}

/// Aggregates component checks and runtime counters.
pub struct HealthReporter<R: ConversationRepository> {
    repo: R,
    persona: Arc<Persona>,
    cache: Arc<ResponseCache>,
    metrics: Arc<PerformanceMonitor>,
    facts: ServiceFacts,
    check_timeout: Duration,
}

impl<R: ConversationRepository> HealthReporter<R> {
    pub fn new(
        repo: R,
        persona: Arc<Persona>,
        cache: Arc<ResponseCache>,
        metrics: Arc<PerformanceMonitor>,
        facts: ServiceFacts,
        check_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            persona,
            cache,
            metrics,
            facts,
            check_timeout,
        }
    }

    /// Run all checks.
    pub async fn check(&self) -> HealthReport {
        let credentials_present = self.facts.credentials_present;
        let persona_loaded = self.persona.is_loaded();

        let (database, credentials, persona) = tokio::join!(
            self.run_check(DATABASE_COMPONENT, async {
                self.repo.ping().await.map_err(|e| e.to_string())
            }),
            self.run_check(CREDENTIALS_COMPONENT, async move {
                if credentials_present {
                    Ok(())
                } else {
                    Err("no API key configured".to_string())
                }
            }),
            self.run_check(PERSONA_COMPONENT, async move {
                if persona_loaded {
                    Ok(())
                } else {
                    Err("using built-in default persona".to_string())
                }
            }),
        );

        let report = HealthReport::from_components(vec![database, credentials, persona]);
        for component in report.components.iter().filter(|c| !c.healthy) {
            warn!(
                component = %component.name,
                detail = component.detail.as_deref().unwrap_or(""),
                "Health check failed"
            );
        }
        report
    }

    /// Health plus counters, cache stats, and storage totals.
    pub async fn system_status(&self) -> SystemStatus {
        let health = self.check().await;

        let totals = tokio::time::timeout(self.check_timeout, async {
            let conversations = self.repo.count_conversations().await?;
            let messages = self.repo.count_all_messages().await?;
            Ok::<_, persona_types::error::RepositoryError>(StorageTotals {
                conversations,
                messages,
            })
        })
        .await;

        let storage = match totals {
            Ok(Ok(totals)) => Some(totals),
            Ok(Err(e)) => {
                warn!(error = %e, "Storage totals unavailable");
                None
            }
            Err(_) => {
                warn!("Storage totals timed out");
                None
            }
        };

        SystemStatus {
            health,
            engine_available: self.facts.credentials_present,
            model: self.facts.model.clone(),
            persona_source: self.facts.persona_source.clone(),
            performance: self.metrics.snapshot(),
            cache: self.cache.stats(),
            storage,
        }
    }

    async fn run_check<F>(&self, name: &str, check: F) -> ComponentHealth
    where
        F: Future<Output = Result<(), String>>,
    {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.check_timeout, check).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (healthy, detail) = match outcome {
            Ok(Ok(())) => (true, None),
            Ok(Err(detail)) => (false, Some(detail)),
            Err(_) => (
                false,
                Some(format!(
                    "check timed out after {}ms",
                    self.check_timeout.as_millis()
                )),
            ),
        };

        ComponentHealth {
            name: name.to_string(),
            healthy,
            detail,
            latency_ms,
        }
    }
}
