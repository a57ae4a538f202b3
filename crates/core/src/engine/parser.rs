use crate::domain::contract::{validate_report, AllocationPolicy};
use crate::domain::report::RecommendationReport;
use crate::error::EngineError;
use std::collections::HashSet;

/// Removes leading/trailing Markdown code fences (```json ... ```).
///
/// This is the only text surgery the validator performs. Anything else that
/// deviates from pure JSON is a parse failure, not something to repair.
pub fn strip_code_fences(text: &str) -> &str {
    let mut inner = text.trim();
    if let Some(rest) = inner.strip_prefix("```") {
        // The language tag is optional and not always followed by a newline.
        inner = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
    }
    inner.trim()
}

/// Converts raw model output into a validated [`RecommendationReport`].
///
/// Pure function: the same `raw_text`, identity set, and policy always yield
/// the same result. The raw text is preserved on every failure path.
pub fn parse_report(
    raw_text: &str,
    known_codes: &HashSet<String>,
    policy: AllocationPolicy,
) -> Result<RecommendationReport, EngineError> {
    let cleaned = strip_code_fences(raw_text);
    let root = serde_json::from_str::<serde_json::Value>(cleaned).map_err(|err| {
        EngineError::MalformedOutput {
            detail: err.to_string(),
            raw_output: raw_text.to_string(),
        }
    })?;

    validate_report(&root, raw_text, known_codes, policy)
}
