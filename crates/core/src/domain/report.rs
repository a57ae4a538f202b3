use serde::{Deserialize, Serialize};

/// Validated portfolio proposal. Invariants are enforced by
/// [`crate::domain::contract`] before a value of this type exists:
/// the portfolio is non-empty, allocations sum to 100 within the configured
/// tolerance, and every code resolves to a profile in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    pub overall_analysis: String,
    pub portfolio: Vec<RecommendedEtf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedEtf {
    #[serde(rename = "etf_code")]
    pub code: String,
    #[serde(rename = "etf_name")]
    pub name: String,
    /// Percentage of investable capital, in [0, 100].
    pub allocation: f64,
    pub reason: String,
}

impl RecommendationReport {
    pub fn total_allocation(&self) -> f64 {
        self.portfolio.iter().map(|etf| etf.allocation).sum()
    }
}

/// Success wire shape: the report under a single `report` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub report: RecommendationReport,
}

/// One holding's contribution to overall portfolio exposure
/// (`weight_pct * allocation / 100`, summed across ETFs sharing the name).
/// Recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedHolding {
    pub holding_name: String,
    pub weighted_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RecommendationReport {
        RecommendationReport {
            overall_analysis: "Balances income against semiconductor growth.".to_string(),
            portfolio: vec![
                RecommendedEtf {
                    code: "0056".to_string(),
                    name: "High Dividend Yield".to_string(),
                    allocation: 60.0,
                    reason: "Steady dividend stream.".to_string(),
                },
                RecommendedEtf {
                    code: "0052".to_string(),
                    name: "Semiconductor Leaders".to_string(),
                    allocation: 40.0,
                    reason: "Growth exposure.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn wire_round_trip_is_identity() {
        let envelope = ReportEnvelope {
            report: sample_report(),
        };
        let wire = serde_json::to_string(&envelope).unwrap();
        let back: ReportEnvelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn wire_field_names_match_contract() {
        let envelope = ReportEnvelope {
            report: sample_report(),
        };
        let v = serde_json::to_value(&envelope).unwrap();
        let first = &v["report"]["portfolio"][0];
        assert_eq!(first["etf_code"], "0056");
        assert_eq!(first["etf_name"], "High Dividend Yield");
        assert_eq!(first["allocation"], 60.0);
        assert!(first.get("code").is_none());
    }

    #[test]
    fn total_allocation_sums_portfolio() {
        assert_eq!(sample_report().total_allocation(), 100.0);
    }
}
