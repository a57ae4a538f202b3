pub mod openai;

/// Converts text into a fixed-length vector. Used both by the ingestion
/// worker to populate the knowledge store and by the retriever to embed
/// queries; both sides must use the same model for distances to mean
/// anything.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Expected vector length. Implementations must reject responses of any
    /// other length.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
