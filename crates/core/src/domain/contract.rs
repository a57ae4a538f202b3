use crate::domain::report::{RecommendationReport, RecommendedEtf};
use crate::error::EngineError;
use serde_json::Value;
use std::collections::HashSet;

/// Default tolerance for absorbing model rounding drift.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// What to do when portfolio allocations do not sum to exactly 100.
///
/// Under either policy a deviation beyond `tolerance` is an
/// [`EngineError::AllocationImbalance`]. Within tolerance, `Reject` accepts
/// the report unchanged while `Normalize` rescales allocations
/// proportionally so they sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AllocationPolicy {
    Reject { tolerance: f64 },
    Normalize { tolerance: f64 },
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::Normalize {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl AllocationPolicy {
    fn tolerance(&self) -> f64 {
        match self {
            Self::Reject { tolerance } | Self::Normalize { tolerance } => *tolerance,
        }
    }
}

/// Validates an already-parsed JSON value against the report contract and
/// converts it into a [`RecommendationReport`].
///
/// This is a boundary parser over adversarial input: no field type is
/// trusted, every violation is reported as a typed failure carrying the raw
/// model text, and nothing is repaired beyond the documented allocation
/// normalization.
pub fn validate_report(
    root: &Value,
    raw_text: &str,
    known_codes: &HashSet<String>,
    policy: AllocationPolicy,
) -> Result<RecommendationReport, EngineError> {
    let violation = |field: &'static str, reason: String| EngineError::SchemaViolation {
        field,
        reason,
        raw_output: raw_text.to_string(),
    };

    let report = root
        .get("report")
        .ok_or_else(|| violation("report", "missing top-level `report` key".to_string()))?;
    let report = report
        .as_object()
        .ok_or_else(|| violation("report", "`report` must be a JSON object".to_string()))?;

    let overall_analysis = report
        .get("overall_analysis")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            violation(
                "overall_analysis",
                "missing or non-string `overall_analysis`".to_string(),
            )
        })?
        .trim()
        .to_string();

    let portfolio = report
        .get("portfolio")
        .and_then(Value::as_array)
        .ok_or_else(|| violation("portfolio", "missing or non-array `portfolio`".to_string()))?;
    if portfolio.is_empty() {
        return Err(violation(
            "portfolio",
            "portfolio must be non-empty".to_string(),
        ));
    }

    let mut etfs = Vec::with_capacity(portfolio.len());
    for (idx, entry) in portfolio.iter().enumerate() {
        etfs.push(validate_entry(idx, entry, raw_text)?);
    }

    let total: f64 = etfs.iter().map(|etf| etf.allocation).sum();
    if (total - 100.0).abs() > policy.tolerance() {
        return Err(EngineError::AllocationImbalance {
            total,
            raw_output: raw_text.to_string(),
        });
    }
    if let AllocationPolicy::Normalize { .. } = policy {
        if total != 100.0 {
            let scale = 100.0 / total;
            for etf in &mut etfs {
                etf.allocation *= scale;
            }
        }
    }

    for etf in &etfs {
        if !known_codes.contains(&etf.code) {
            return Err(EngineError::UnknownEtfCode {
                code: etf.code.clone(),
                raw_output: raw_text.to_string(),
            });
        }
    }

    Ok(RecommendationReport {
        overall_analysis,
        portfolio: etfs,
    })
}

fn validate_entry(idx: usize, entry: &Value, raw_text: &str) -> Result<RecommendedEtf, EngineError> {
    let violation = |field: &'static str, reason: String| EngineError::SchemaViolation {
        field,
        reason,
        raw_output: raw_text.to_string(),
    };

    let entry = entry
        .as_object()
        .ok_or_else(|| violation("portfolio", format!("entry {idx} must be an object")))?;

    let code = entry
        .get("etf_code")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            violation(
                "portfolio.etf_code",
                format!("entry {idx}: missing or empty `etf_code`"),
            )
        })?
        .to_string();

    let name = entry
        .get("etf_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            violation(
                "portfolio.etf_name",
                format!("entry {idx}: missing or empty `etf_name`"),
            )
        })?
        .to_string();

    let allocation = entry
        .get("allocation")
        .and_then(coerce_number)
        .ok_or_else(|| {
            violation(
                "portfolio.allocation",
                format!("entry {idx}: `allocation` is missing or not coercible to a number"),
            )
        })?;
    if !(0.0..=100.0).contains(&allocation) {
        return Err(violation(
            "portfolio.allocation",
            format!("entry {idx}: allocation {allocation} outside [0, 100]"),
        ));
    }

    let reason = entry
        .get("reason")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            violation(
                "portfolio.reason",
                format!("entry {idx}: missing or non-string `reason`"),
            )
        })?
        .trim()
        .to_string();

    Ok(RecommendedEtf {
        code,
        name,
        allocation,
        reason,
    })
}

/// Accepts a JSON number or a numeric string such as `"40"` — models
/// occasionally quote the allocation even when told not to.
fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known() -> HashSet<String> {
        ["0056", "0052", "0050"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn envelope(allocations: &[f64]) -> Value {
        let codes = ["0056", "0052", "0050"];
        let portfolio: Vec<Value> = allocations
            .iter()
            .zip(codes)
            .map(|(a, code)| {
                json!({
                    "etf_code": code,
                    "etf_name": format!("ETF {code}"),
                    "allocation": a,
                    "reason": "fits the requested themes",
                })
            })
            .collect();
        json!({
            "report": {
                "overall_analysis": "balanced mix",
                "portfolio": portfolio,
            }
        })
    }

    #[test]
    fn accepts_exact_sum() {
        let v = envelope(&[60.0, 40.0]);
        let report = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap();
        assert_eq!(report.portfolio.len(), 2);
        assert_eq!(report.total_allocation(), 100.0);
    }

    #[test]
    fn normalize_rescales_within_tolerance() {
        let v = envelope(&[59.8, 40.0]);
        let report = validate_report(
            &v,
            "raw",
            &known(),
            AllocationPolicy::Normalize { tolerance: 0.5 },
        )
        .unwrap();
        assert!((report.total_allocation() - 100.0).abs() < 1e-9);
        // Proportions are preserved.
        let ratio = report.portfolio[0].allocation / report.portfolio[1].allocation;
        assert!((ratio - 59.8 / 40.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_rejects_beyond_tolerance() {
        let v = envelope(&[55.0, 40.0]);
        let err = validate_report(
            &v,
            "raw",
            &known(),
            AllocationPolicy::Normalize { tolerance: 0.5 },
        )
        .unwrap_err();
        match err {
            EngineError::AllocationImbalance { total, raw_output } => {
                assert_eq!(total, 95.0);
                assert_eq!(raw_output, "raw");
            }
            other => panic!("expected AllocationImbalance, got {other:?}"),
        }
    }

    #[test]
    fn reject_policy_accepts_small_drift_unchanged() {
        let v = envelope(&[59.8, 40.0]);
        let report = validate_report(
            &v,
            "raw",
            &known(),
            AllocationPolicy::Reject { tolerance: 0.5 },
        )
        .unwrap();
        assert_eq!(report.total_allocation(), 99.8);
    }

    #[test]
    fn reject_policy_fails_ninety_five_percent_total() {
        let v = envelope(&[55.0, 40.0]);
        let err = validate_report(
            &v,
            "raw",
            &known(),
            AllocationPolicy::Reject { tolerance: 0.5 },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::AllocationImbalance { .. }));
    }

    #[test]
    fn wide_normalize_tolerance_absorbs_ninety_five_percent_total() {
        let v = envelope(&[55.0, 40.0]);
        let report = validate_report(
            &v,
            "raw",
            &known(),
            AllocationPolicy::Normalize { tolerance: 5.0 },
        )
        .unwrap();
        assert!((report.total_allocation() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn coerces_string_allocation() {
        let v = json!({
            "report": {
                "overall_analysis": "ok",
                "portfolio": [{
                    "etf_code": "0056",
                    "etf_name": "ETF 0056",
                    "allocation": "100",
                    "reason": "only pick",
                }]
            }
        });
        let report = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap();
        assert_eq!(report.portfolio[0].allocation, 100.0);
    }

    #[test]
    fn missing_wrapper_key_is_schema_violation() {
        let v = json!({"overall_analysis": "ok", "portfolio": []});
        let err = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap_err();
        match err {
            EngineError::SchemaViolation { field, .. } => assert_eq!(field, "report"),
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn empty_portfolio_is_schema_violation() {
        let v = json!({"report": {"overall_analysis": "ok", "portfolio": []}});
        let err = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SchemaViolation {
                field: "portfolio",
                ..
            }
        ));
    }

    #[test]
    fn missing_reason_is_schema_violation() {
        let v = json!({
            "report": {
                "overall_analysis": "ok",
                "portfolio": [{
                    "etf_code": "0056",
                    "etf_name": "ETF 0056",
                    "allocation": 100,
                }]
            }
        });
        let err = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SchemaViolation {
                field: "portfolio.reason",
                ..
            }
        ));
    }

    #[test]
    fn allocation_outside_bounds_is_schema_violation() {
        let v = json!({
            "report": {
                "overall_analysis": "ok",
                "portfolio": [{
                    "etf_code": "0056",
                    "etf_name": "ETF 0056",
                    "allocation": 120,
                    "reason": "overweight",
                }]
            }
        });
        let err = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SchemaViolation {
                field: "portfolio.allocation",
                ..
            }
        ));
    }

    #[test]
    fn unknown_code_fails_without_partial_report() {
        let v = json!({
            "report": {
                "overall_analysis": "ok",
                "portfolio": [
                    {
                        "etf_code": "0056",
                        "etf_name": "ETF 0056",
                        "allocation": 50,
                        "reason": "income",
                    },
                    {
                        "etf_code": "9999",
                        "etf_name": "Fabricated",
                        "allocation": 50,
                        "reason": "hallucinated",
                    }
                ]
            }
        });
        let err = validate_report(&v, "raw", &known(), AllocationPolicy::default()).unwrap_err();
        match err {
            EngineError::UnknownEtfCode { code, .. } => assert_eq!(code, "9999"),
            other => panic!("expected UnknownEtfCode, got {other:?}"),
        }
    }
}
