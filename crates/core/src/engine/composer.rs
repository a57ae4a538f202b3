use crate::domain::profile::ScoredDocument;
use crate::error::EngineError;
use crate::llm::{GenerateRequest, LlmClient};
use std::sync::Arc;

/// Separates knowledge records inside the context block so the model can
/// tell where one ETF ends and the next begins.
pub const DOCUMENT_DELIMITER: &str = "\n\n---\n\n";

pub struct Composer {
    llm: Arc<dyn LlmClient>,
}

impl Composer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Issues exactly one generation request and returns the raw text.
    /// Structural compliance is requested (temperature 0, strict contract in
    /// the system prompt) but never assumed; the parser validates downstream.
    pub async fn compose(
        &self,
        themes: &[String],
        documents: &[ScoredDocument],
    ) -> Result<String, EngineError> {
        let req = GenerateRequest {
            system: system_prompt(),
            prompt: user_prompt(themes, documents),
            temperature: 0.0,
        };

        tracing::debug!(
            documents = documents.len(),
            prompt_bytes = req.prompt.len(),
            "requesting portfolio generation"
        );

        self.llm
            .generate(req)
            .await
            .map_err(|err| EngineError::generation_failure(&err))
    }
}

fn system_prompt() -> String {
    [
        "You are a professional, cautious, and trustworthy ETF investment advisor.",
        "Select the 2-3 ETFs from the supplied knowledge records that best fit the user's preferences. Use only the supplied records; never draw on outside knowledge.",
        "Return exactly ONE JSON object and nothing else: no prose, no markdown, no comments.",
        "The root key must be \"report\", wrapping:",
        "  \"overall_analysis\": why this mix fits the user's preferences, as free text",
        "  \"portfolio\": an array of objects, each with keys:",
        "    \"etf_code\": the ETF's code",
        "    \"etf_name\": the ETF's name",
        "    \"allocation\": suggested capital allocation as a bare number (e.g. 40, no % sign)",
        "    \"reason\": a short reason for recommending this ETF",
        "The allocation values across the portfolio MUST sum to exactly 100.",
    ]
    .join("\n")
}

fn user_prompt(themes: &[String], documents: &[ScoredDocument]) -> String {
    let context = documents
        .iter()
        .map(|doc| doc.document.content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_DELIMITER);

    format!(
        "The user's investment preferences are: {}.\n\n\
         ETF knowledge records:\n---\n{}\n---\n\n\
         Produce the portfolio report JSON as instructed.",
        themes.join(", "),
        context
    )
}
