use crate::domain::profile::{Holding, ScoredDocument};
use std::collections::HashSet;

/// Read side of the semantic index. Implementations must rank results by
/// ascending distance under the same metric used to build the index.
///
/// Passed into the engine as an explicit handle so tests can substitute
/// in-memory doubles; never an ambient singleton.
#[async_trait::async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredDocument>>;

    /// Identity set of every ETF code the store knows about, used to
    /// cross-check model output.
    async fn known_codes(&self) -> anyhow::Result<HashSet<String>>;
}

/// Profile-side lookup consumed by the holdings aggregator.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Top holdings for one ETF in stored order. An empty vector means the
    /// profile carries no holdings data; that is not an error.
    async fn top_holdings(&self, code: &str) -> anyhow::Result<Vec<Holding>>;
}
