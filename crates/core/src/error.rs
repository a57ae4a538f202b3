use serde::Serialize;
use std::fmt;

/// Failure taxonomy for the recommendation pipeline.
///
/// Infrastructure variants (`StoreUnavailable`, `EmbeddingFailure`,
/// `GenerationFailure`) abort the pipeline and carry only a short diagnostic.
/// Content variants carry the raw model output verbatim: it is the only
/// evidence of the model's behavior and must survive to the caller.
#[derive(Debug, Clone)]
pub enum EngineError {
    StoreUnavailable {
        detail: String,
    },
    EmbeddingFailure {
        detail: String,
    },
    GenerationFailure {
        detail: String,
    },
    MalformedOutput {
        detail: String,
        raw_output: String,
    },
    SchemaViolation {
        field: &'static str,
        reason: String,
        raw_output: String,
    },
    AllocationImbalance {
        total: f64,
        raw_output: String,
    },
    UnknownEtfCode {
        code: String,
        raw_output: String,
    },
}

impl EngineError {
    pub fn store_unavailable(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable {
            detail: format!("{err:#}"),
        }
    }

    pub fn embedding_failure(err: &anyhow::Error) -> Self {
        Self::EmbeddingFailure {
            detail: format!("{err:#}"),
        }
    }

    pub fn generation_failure(err: &anyhow::Error) -> Self {
        Self::GenerationFailure {
            detail: format!("{err:#}"),
        }
    }

    /// Raw model output, present only for content-layer failures.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::StoreUnavailable { .. }
            | Self::EmbeddingFailure { .. }
            | Self::GenerationFailure { .. } => None,
            Self::MalformedOutput { raw_output, .. }
            | Self::SchemaViolation { raw_output, .. }
            | Self::AllocationImbalance { raw_output, .. }
            | Self::UnknownEtfCode { raw_output, .. } => Some(raw_output),
        }
    }

    /// True for failures of the surrounding infrastructure (store, embedding,
    /// generation transport) as opposed to failures of the model's content.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::EmbeddingFailure { .. }
                | Self::GenerationFailure { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::EmbeddingFailure { .. } => "embedding_failure",
            Self::GenerationFailure { .. } => "generation_failure",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::AllocationImbalance { .. } => "allocation_imbalance",
            Self::UnknownEtfCode { .. } => "unknown_etf_code",
        }
    }

    pub fn to_envelope(&self) -> FailureEnvelope {
        FailureEnvelope {
            error: self.to_string(),
            raw_output: self.raw_output().map(str::to_string),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreUnavailable { detail } => {
                write!(f, "knowledge store unavailable: {detail}")
            }
            Self::EmbeddingFailure { detail } => write!(f, "embedding failed: {detail}"),
            Self::GenerationFailure { detail } => write!(f, "generation failed: {detail}"),
            Self::MalformedOutput { detail, .. } => {
                write!(f, "model output is not valid JSON: {detail}")
            }
            Self::SchemaViolation { field, reason, .. } => {
                write!(f, "model output violates report schema at `{field}`: {reason}")
            }
            Self::AllocationImbalance { total, .. } => {
                write!(f, "portfolio allocations sum to {total}, expected 100")
            }
            Self::UnknownEtfCode { code, .. } => {
                write!(f, "recommended ETF code `{code}` is not in the knowledge base")
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Wire shape for any failed recommendation request.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}
