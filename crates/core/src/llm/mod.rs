pub mod anthropic;

/// One generation request. The composer owns prompt construction; clients
/// only move text.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub prompt: String,
    /// Sampling temperature. The composer always asks for 0.0 to minimize
    /// variance in structural compliance.
    pub temperature: f32,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Issues exactly one model call and returns the raw text. No retries,
    /// no repair loops: validation is the parser's job downstream.
    async fn generate(&self, req: GenerateRequest) -> anyhow::Result<String>;
}
