use crate::domain::profile::ScoredDocument;
use crate::embedding::EmbeddingClient;
use crate::error::EngineError;
use crate::store::KnowledgeStore;
use std::sync::Arc;

/// Builds the natural-language retrieval query from the chosen theme labels.
///
/// The bias phrase is a product tuning choice, not a structural requirement,
/// so it lives behind a trait rather than a hardcoded constant.
pub trait QueryStrategy: Send + Sync {
    fn build_query(&self, themes: &[String]) -> String;
}

/// Default strategy: join the labels and bias toward income/growth ETF
/// discovery, mirroring how the knowledge base is described.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncomeGrowthBias;

impl QueryStrategy for IncomeGrowthBias {
    fn build_query(&self, themes: &[String]) -> String {
        format!(
            "Find dividend-income or growth ETFs related to '{}'",
            themes.join(", ")
        )
    }
}

pub struct Retriever {
    embedding: Arc<dyn EmbeddingClient>,
    store: Arc<dyn KnowledgeStore>,
    strategy: Box<dyn QueryStrategy>,
}

impl Retriever {
    pub fn new(embedding: Arc<dyn EmbeddingClient>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self::with_strategy(embedding, store, Box::new(IncomeGrowthBias))
    }

    pub fn with_strategy(
        embedding: Arc<dyn EmbeddingClient>,
        store: Arc<dyn KnowledgeStore>,
        strategy: Box<dyn QueryStrategy>,
    ) -> Self {
        Self {
            embedding,
            store,
            strategy,
        }
    }

    /// Embeds the theme query and returns the `k` nearest documents, ordered
    /// by ascending distance. Read-only; infrastructure errors surface as
    /// typed failures and are never retried here.
    pub async fn retrieve(
        &self,
        themes: &[String],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, EngineError> {
        let query = self.strategy.build_query(themes);
        tracing::debug!(%query, k, "retrieving context documents");

        let vector = self
            .embedding
            .embed(&query)
            .await
            .map_err(|err| EngineError::embedding_failure(&err))?;
        if vector.len() != self.embedding.dimensions() {
            return Err(EngineError::EmbeddingFailure {
                detail: format!(
                    "query embedding has unexpected dimensionality: expected {}, got {}",
                    self.embedding.dimensions(),
                    vector.len()
                ),
            });
        }

        let mut documents = self
            .store
            .search(&vector, k)
            .await
            .map_err(|err| EngineError::store_unavailable(&err))?;
        documents.truncate(k);
        Ok(documents)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::profile::{Holding, KnowledgeDocument};
    use crate::store::ProfileStore;
    use std::collections::{HashMap, HashSet};

    pub struct FixedEmbedding {
        pub vector: Vec<f32>,
        pub dimensions: usize,
    }

    #[async_trait::async_trait]
    impl crate::embedding::EmbeddingClient for FixedEmbedding {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.vector.clone())
        }
    }

    pub struct FailingEmbedding;

    #[async_trait::async_trait]
    impl crate::embedding::EmbeddingClient for FailingEmbedding {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("embedding backend is down")
        }
    }

    /// In-memory store: returns its documents verbatim (already ranked) and
    /// serves holdings from a map.
    pub struct InMemoryStore {
        pub documents: Vec<ScoredDocument>,
        pub holdings: HashMap<String, Vec<Holding>>,
    }

    impl InMemoryStore {
        pub fn with_codes(codes: &[&str]) -> Self {
            let documents = codes
                .iter()
                .enumerate()
                .map(|(i, code)| ScoredDocument {
                    document: KnowledgeDocument {
                        code: code.to_string(),
                        name: format!("ETF {code}"),
                        theme: "High Dividend".to_string(),
                        content: format!("code: {code}"),
                    },
                    distance: 0.1 * (i as f64 + 1.0),
                })
                .collect();
            Self {
                documents,
                holdings: HashMap::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl KnowledgeStore for InMemoryStore {
        async fn search(&self, _vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredDocument>> {
            Ok(self.documents.iter().take(k).cloned().collect())
        }

        async fn known_codes(&self) -> anyhow::Result<HashSet<String>> {
            Ok(self
                .documents
                .iter()
                .map(|d| d.document.code.clone())
                .collect())
        }
    }

    #[async_trait::async_trait]
    impl ProfileStore for InMemoryStore {
        async fn top_holdings(&self, code: &str) -> anyhow::Result<Vec<Holding>> {
            Ok(self.holdings.get(code).cloned().unwrap_or_default())
        }
    }

    pub struct UnavailableStore;

    #[async_trait::async_trait]
    impl KnowledgeStore for UnavailableStore {
        async fn search(&self, _vector: &[f32], _k: usize) -> anyhow::Result<Vec<ScoredDocument>> {
            anyhow::bail!("connection refused")
        }

        async fn known_codes(&self) -> anyhow::Result<HashSet<String>> {
            anyhow::bail!("connection refused")
        }
    }
}
