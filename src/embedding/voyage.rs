//! Voyage API client: embeddings and reranking.
//!
//! One client instance is shared by the indexer and every product's
//! searcher. All calls pass through the shared rate limiter first; a
//! [`RateLimitError`] escapes to the caller, which decides whether to
//! resume later (indexer) or surface it to the client (searcher).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::{BATCH_TOKEN_BUDGET, MAX_ATTEMPTS, estimate_tokens, plan_batches};
use crate::error::{ApiError, Error, Result};
use crate::limiter::RateLimiter;

/// Default Voyage API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.voyageai.com";

/// Backoff base for retryable failures: `base * 2^(attempt-1)`.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Embedding dimension declared for a Voyage model.
#[must_use]
pub fn model_dimension(model: &str) -> usize {
    match model {
        "voyage-3-lite" => 512,
        "voyage-code-2" => 1536,
        // voyage-3, voyage-3-large, voyage-code-3
        _ => 1024,
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    model: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    data: Vec<RerankDatum>,
}

#[derive(Debug, Deserialize)]
struct RerankDatum {
    index: usize,
    relevance_score: f32,
}

/// Voyage embeddings + rerank client with token-aware batching.
#[derive(Debug, Clone)]
pub struct VoyageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    embed_model: String,
    rerank_model: String,
    dimension: usize,
    max_batch_inputs: usize,
    limiter: Arc<RateLimiter>,
}

impl VoyageClient {
    /// Creates a client for the given models, sharing `limiter` with all
    /// other upstream callers.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        embed_model: impl Into<String>,
        rerank_model: impl Into<String>,
        max_batch_inputs: usize,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let embed_model = embed_model.into();
        let dimension = model_dimension(&embed_model);
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            embed_model,
            rerank_model: rerank_model.into(),
            dimension,
            max_batch_inputs,
            limiter,
        }
    }

    /// Overrides the API base URL (tests point this at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Dimension of the configured embedding model.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds a corpus of documents, batching by token estimate.
    ///
    /// Returns one vector per input, in input order.
    ///
    /// # Errors
    ///
    /// [`Error::RateLimit`] when the limiter refuses a batch;
    /// [`Error::Api`] for upstream failures that survive the retry policy
    /// or for a dimension mismatch.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for range in plan_batches(texts, self.max_batch_inputs, BATCH_TOKEN_BUDGET) {
            let batch = &texts[range];
            let batch_vectors = self.embed_batch(batch, "document").await?;
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }

    /// Embeds a single query string.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::embed_documents`].
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input, "query").await?;
        vectors.pop().ok_or_else(|| {
            Error::Api(ApiError::InvalidResponse {
                message: "embeddings response was empty".to_string(),
            })
        })
    }

    async fn embed_batch(&self, batch: &[String], input_type: &str) -> Result<Vec<Vec<f32>>> {
        let batch_tokens: u64 = batch.iter().map(|t| estimate_tokens(t)).sum();
        self.limiter.check_and_record(batch_tokens)?;

        let request = EmbeddingsRequest {
            input: batch,
            model: &self.embed_model,
            input_type,
        };
        let response: EmbeddingsResponse =
            self.post_with_retry("/v1/embeddings", &request).await?;

        if response.data.len() != batch.len() {
            return Err(Error::Api(ApiError::InvalidResponse {
                message: format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.data.len()
                ),
            }));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        for datum in &data {
            if datum.embedding.len() != self.dimension {
                return Err(Error::Api(ApiError::DimensionMismatch {
                    expected: self.dimension,
                    actual: datum.embedding.len(),
                }));
            }
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Scores `documents` against `query` with the configured rerank model.
    ///
    /// Returns `(input_index, relevance_score)` pairs, highest relevance
    /// first, at most `top_k` entries. Callers treat failure as
    /// best-effort and keep their pre-rerank ordering.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the upstream call fails after retries.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> std::result::Result<Vec<(usize, f32)>, ApiError> {
        let request = RerankRequest {
            query,
            documents,
            model: &self.rerank_model,
            top_k: top_k.min(documents.len()),
        };
        let response: RerankResponse = self.post_with_retry("/v1/rerank", &request).await?;
        Ok(response
            .data
            .into_iter()
            .map(|d| (d.index, d.relevance_score))
            .collect())
    }

    /// POSTs `body` to `path`, retrying transient failures up to
    /// [`MAX_ATTEMPTS`] with exponential backoff.
    async fn post_with_retry<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let mut attempt = 1u32;
        loop {
            match self.post_once(path, body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        path,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "retrying voyage call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: e.to_string(),
            })
    }
}
