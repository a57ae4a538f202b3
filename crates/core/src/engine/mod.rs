pub mod aggregate;
pub mod composer;
pub mod parser;
pub mod retriever;

use crate::domain::contract::{AllocationPolicy, DEFAULT_TOLERANCE};
use crate::domain::report::{AggregatedHolding, RecommendationReport};
use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::llm::LlmClient;
use crate::store::{KnowledgeStore, ProfileStore};
use composer::Composer;
use retriever::Retriever;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// How many knowledge documents to feed the composer.
    pub top_k: usize,
    pub policy: AllocationPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            policy: AllocationPolicy::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("RETRIEVAL_TOP_K") {
            if let Ok(n) = s.parse::<usize>() {
                if n > 0 {
                    out.top_k = n;
                }
            }
        }

        let tolerance = std::env::var("ALLOCATION_TOLERANCE")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(DEFAULT_TOLERANCE);
        out.policy = match std::env::var("ALLOCATION_POLICY").as_deref() {
            Ok("reject") => AllocationPolicy::Reject { tolerance },
            _ => AllocationPolicy::Normalize { tolerance },
        };

        out
    }
}

/// The recommendation pipeline: retrieve → compose → validate, plus holdings
/// aggregation over the validated report.
///
/// Collaborators are injected as explicit handles; the engine holds no
/// request-local state, so one instance serves concurrent requests.
pub struct RecommendationEngine {
    retriever: Retriever,
    composer: Composer,
    store: Arc<dyn KnowledgeStore>,
    profiles: Arc<dyn ProfileStore>,
    options: EngineOptions,
}

impl RecommendationEngine {
    pub fn new(
        embedding: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn KnowledgeStore>,
        profiles: Arc<dyn ProfileStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedding, store.clone()),
            composer: Composer::new(llm),
            store,
            profiles,
            options,
        }
    }

    /// Runs one recommendation request end to end. Infrastructure failures
    /// abort immediately; content failures carry the raw model output.
    pub async fn recommend(
        &self,
        themes: &[String],
    ) -> Result<RecommendationReport, EngineError> {
        let documents = self.retriever.retrieve(themes, self.options.top_k).await?;
        tracing::info!(
            retrieved = documents.len(),
            themes = themes.len(),
            "retrieved context documents"
        );

        let raw_text = self.composer.compose(themes, &documents).await?;

        let known_codes = self
            .store
            .known_codes()
            .await
            .map_err(|err| EngineError::store_unavailable(&err))?;

        parser::parse_report(&raw_text, &known_codes, self.options.policy)
    }

    /// Aggregates the report's underlying holdings into one weighted
    /// exposure table, descending by weighted percent. ETFs without holdings
    /// data are skipped rather than failing the request.
    pub async fn aggregate(
        &self,
        report: &RecommendationReport,
    ) -> Result<Vec<AggregatedHolding>, EngineError> {
        let mut rows = Vec::with_capacity(report.portfolio.len());
        for etf in &report.portfolio {
            let holdings = self
                .profiles
                .top_holdings(&etf.code)
                .await
                .map_err(|err| EngineError::store_unavailable(&err))?;
            if holdings.is_empty() {
                tracing::debug!(code = %etf.code, "no holdings data; ETF contributes nothing");
            }
            rows.push((etf.allocation, holdings));
        }

        Ok(aggregate::aggregate_exposures(&rows))
    }
}
