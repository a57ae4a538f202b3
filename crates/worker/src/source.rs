use advisor_core::domain::profile::{
    EtfProfile, Holding, KnowledgeDocument, TrailingPerformance, MAX_HOLDINGS,
};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// One row of the profile source file (a JSON array exported from the
/// upstream spreadsheet).
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRecord {
    pub code: String,
    pub name: String,
    pub theme: String,
    #[serde(default)]
    pub expense_ratio: Option<f64>,
    #[serde(default)]
    pub custody_fee: Option<f64>,
    #[serde(default)]
    pub net_asset_value: Option<f64>,
    #[serde(default)]
    pub annualized_yield: Option<f64>,
    #[serde(default)]
    pub performance: TrailingPerformance,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

pub fn load_profiles(path: &Path) -> anyhow::Result<Vec<EtfProfile>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile source {}", path.display()))?;
    let records: Vec<ProfileRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("profile source {} is not a JSON array", path.display()))?;
    anyhow::ensure!(!records.is_empty(), "profile source contains no records");

    let mut out = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        out.push(
            validate_record(record)
                .with_context(|| format!("invalid profile record at index {idx}"))?,
        );
    }
    Ok(out)
}

fn validate_record(record: ProfileRecord) -> anyhow::Result<EtfProfile> {
    let code = record.code.trim().to_string();
    anyhow::ensure!(!code.is_empty(), "code must be non-empty");
    anyhow::ensure!(
        code.chars().all(|c| c.is_ascii_alphanumeric()),
        "code must be short alphanumeric (got {code:?})"
    );

    let name = record.name.trim().to_string();
    anyhow::ensure!(!name.is_empty(), "name must be non-empty");

    let theme = record.theme.trim().to_string();
    anyhow::ensure!(!theme.is_empty(), "theme must be non-empty");

    let mut holdings = record.holdings;
    // The profile contract carries at most the top 10 holdings.
    holdings.truncate(MAX_HOLDINGS);
    for holding in &holdings {
        anyhow::ensure!(
            !holding.name.trim().is_empty(),
            "holding name must be non-empty"
        );
        anyhow::ensure!(
            holding.weight_pct.is_finite() && holding.weight_pct >= 0.0,
            "holding weight must be non-negative (got {})",
            holding.weight_pct
        );
    }

    Ok(EtfProfile {
        code,
        name,
        theme,
        expense_ratio: record.expense_ratio,
        custody_fee: record.custody_fee,
        net_asset_value: record.net_asset_value,
        annualized_yield: record.annualized_yield,
        performance: record.performance,
        holdings,
    })
}

/// Renders the denormalized text the knowledge store indexes: one
/// `field: value` line per populated field, holdings last. This is what the
/// embedding sees, so wording stays close to the profile source.
pub fn render_document(profile: &EtfProfile) -> KnowledgeDocument {
    let mut lines = vec![
        format!("code: {}", profile.code),
        format!("name: {}", profile.name),
        format!("theme: {}", profile.theme),
    ];

    let mut push_opt = |label: &str, value: Option<f64>| {
        if let Some(v) = value {
            lines.push(format!("{label}: {v}"));
        }
    };
    push_opt("expense_ratio_pct", profile.expense_ratio);
    push_opt("custody_fee_pct", profile.custody_fee);
    push_opt("net_asset_value", profile.net_asset_value);
    push_opt("annualized_yield_pct", profile.annualized_yield);
    push_opt("return_1m_pct", profile.performance.one_month);
    push_opt("return_3m_pct", profile.performance.three_months);
    push_opt("return_6m_pct", profile.performance.six_months);
    push_opt("return_1y_pct", profile.performance.one_year);

    for (i, holding) in profile.holdings.iter().enumerate() {
        lines.push(format!(
            "holding_{}: {} ({}%)",
            i + 1,
            holding.name,
            holding.weight_pct
        ));
    }

    KnowledgeDocument {
        code: profile.code.clone(),
        name: profile.name.clone(),
        theme: profile.theme.clone(),
        content: lines.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(code: &str) -> ProfileRecord {
        serde_json::from_value(json!({
            "code": code,
            "name": format!("ETF {code}"),
            "theme": "High Dividend",
            "expense_ratio": 0.32,
            "annualized_yield": 6.1,
            "performance": {"one_month": 1.2, "one_year": 9.8},
            "holdings": [
                {"name": "TSMC", "weight_pct": 47.3},
                {"name": "MediaTek", "weight_pct": 4.5}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn validates_and_converts_a_record() {
        let profile = validate_record(record("0056")).unwrap();
        assert_eq!(profile.code, "0056");
        assert_eq!(profile.holdings.len(), 2);
        assert_eq!(profile.performance.one_year, Some(9.8));
        assert_eq!(profile.performance.three_months, None);
    }

    #[test]
    fn rejects_non_alphanumeric_codes() {
        let mut r = record("0056");
        r.code = "00 56!".to_string();
        assert!(validate_record(r).is_err());
    }

    #[test]
    fn rejects_negative_holding_weights() {
        let mut r = record("0056");
        r.holdings[0].weight_pct = -1.0;
        assert!(validate_record(r).is_err());
    }

    #[test]
    fn truncates_holdings_to_top_ten() {
        let mut r = record("0056");
        r.holdings = (0..15)
            .map(|i| Holding {
                name: format!("H{i}"),
                weight_pct: 1.0,
            })
            .collect();
        let profile = validate_record(r).unwrap();
        assert_eq!(profile.holdings.len(), MAX_HOLDINGS);
        assert_eq!(profile.holdings[0].name, "H0");
    }

    #[test]
    fn rendered_document_lists_fields_and_holdings() {
        let profile = validate_record(record("0056")).unwrap();
        let doc = render_document(&profile);

        assert_eq!(doc.code, "0056");
        assert!(doc.content.contains("code: 0056"));
        assert!(doc.content.contains("theme: High Dividend"));
        assert!(doc.content.contains("annualized_yield_pct: 6.1"));
        assert!(doc.content.contains("holding_1: TSMC (47.3%)"));
        // Absent metrics are omitted entirely.
        assert!(!doc.content.contains("custody_fee"));
    }
}
