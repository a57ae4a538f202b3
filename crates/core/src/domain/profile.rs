use serde::{Deserialize, Serialize};

/// Theme vocabulary offered to callers. The engine itself treats labels as
/// opaque query terms, so an unknown label degrades retrieval quality but is
/// never rejected here.
pub const AVAILABLE_THEMES: [&str; 6] = [
    "High Dividend",
    "Tech / Semiconductor",
    "Broad Market",
    "ESG",
    "Bonds",
    "Low Volatility",
];

/// Point-in-time snapshot of one ETF, written only by the ingestion worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtfProfile {
    pub code: String,
    pub name: String,
    pub theme: String,
    pub expense_ratio: Option<f64>,
    pub custody_fee: Option<f64>,
    pub net_asset_value: Option<f64>,
    pub annualized_yield: Option<f64>,
    pub performance: TrailingPerformance,
    /// Ordered, at most [`MAX_HOLDINGS`] entries.
    pub holdings: Vec<Holding>,
}

/// Trailing returns over the horizons carried by the profile source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrailingPerformance {
    pub one_month: Option<f64>,
    pub three_months: Option<f64>,
    pub six_months: Option<f64>,
    pub one_year: Option<f64>,
}

pub const MAX_HOLDINGS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub name: String,
    pub weight_pct: f64,
}

/// Denormalized text rendering of one profile, one-to-one with
/// [`EtfProfile`], regenerated whenever the profile is rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub code: String,
    pub name: String,
    pub theme: String,
    pub content: String,
}

/// A retrieval hit: document plus its distance from the query vector.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: KnowledgeDocument,
    pub distance: f64,
}
