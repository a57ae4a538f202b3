use crate::config::Settings;
use crate::embedding::EmbeddingClient;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dimensions = std::env::var("EMBEDDING_DIMENSIONS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_DIMENSIONS);

        let timeout_secs = std::env::var("EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build embeddings http client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            dimensions,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .context("embeddings request failed")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read embeddings response body")?;
        if !status.is_success() {
            anyhow::bail!("embeddings HTTP {status}: {body}");
        }

        let parsed = serde_json::from_str::<EmbeddingsResponse>(&body)
            .with_context(|| format!("failed to decode embeddings response: {body}"))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .context("embeddings response contained no vectors")?
            .embedding;

        anyhow::ensure!(
            vector.len() == self.dimensions,
            "embedding has unexpected dimensionality: expected {}, got {}",
            self.dimensions,
            vector.len()
        );

        Ok(vector)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}
