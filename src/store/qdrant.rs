//! Qdrant REST client.
//!
//! Collection management, batched upserts, hybrid and dense queries, and
//! payload-filtered scrolling. Responses arrive wrapped in Qdrant's
//! `{result, status, time}` envelope; only `result` is read.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::point_id;
use crate::error::ApiError;
use crate::store::{BM25_MODEL, BM25_VECTOR, DENSE_VECTOR, Point, PointPayload, ScoredPoint, UPSERT_SUB_BATCH};

/// Attempts for transient upsert failures.
const UPSERT_ATTEMPTS: u32 = 3;

/// Linear backoff step between upsert attempts.
const UPSERT_BACKOFF: Duration = Duration::from_secs(1);

/// HNSW connectivity for the dense vector.
const HNSW_M: u32 = 16;

/// HNSW construction beam width for the dense vector.
const HNSW_EF_CONSTRUCT: u32 = 100;

/// Collection indexing threshold in points.
const INDEXING_THRESHOLD: u32 = 10_000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct PointsResult {
    points: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    id: serde_json::Value,
    #[serde(default)]
    score: Option<f32>,
    payload: serde_json::Value,
}

/// Collection summary returned by [`QdrantClient::collection_info`].
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    /// Number of points in the collection, when reported.
    #[serde(default)]
    pub points_count: Option<u64>,
    /// Collection status string (`green`, `yellow`, ...).
    #[serde(default)]
    pub status: String,
}

/// Thin Qdrant REST client shared by the indexer and all searchers.
#[derive(Debug, Clone)]
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantClient {
    /// Creates a client against the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Creates a collection with the two named vectors used by docdex:
    /// cosine `dense` of dimension `dim` and an IDF-modified `bm25`
    /// sparse vector.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the store rejects the request.
    pub async fn create_collection(&self, name: &str, dim: usize) -> Result<(), ApiError> {
        let body = json!({
            "vectors": {
                DENSE_VECTOR: {
                    "size": dim,
                    "distance": "Cosine",
                    "hnsw_config": {"m": HNSW_M, "ef_construct": HNSW_EF_CONSTRUCT},
                }
            },
            "sparse_vectors": {
                BM25_VECTOR: {"modifier": "idf"}
            },
            "optimizers_config": {"indexing_threshold": INDEXING_THRESHOLD},
        });
        let _: Envelope<bool> = self
            .request(reqwest::Method::PUT, &format!("/collections/{name}"), Some(&body))
            .await?;
        Ok(())
    }

    /// Whether a collection exists.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the store is unreachable.
    pub async fn collection_exists(&self, name: &str) -> Result<bool, ApiError> {
        let envelope: Envelope<ExistsResult> = self
            .request::<serde_json::Value, _>(
                reqwest::Method::GET,
                &format!("/collections/{name}/exists"),
                None,
            )
            .await?;
        Ok(envelope.result.exists)
    }

    /// Drops a collection and all its points.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the store rejects the request.
    pub async fn delete_collection(&self, name: &str) -> Result<(), ApiError> {
        let _: Envelope<bool> = self
            .request::<serde_json::Value, _>(
                reqwest::Method::DELETE,
                &format!("/collections/{name}"),
                None,
            )
            .await?;
        Ok(())
    }

    /// Fetches collection status and point count.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the store rejects the request.
    pub async fn collection_info(&self, name: &str) -> Result<CollectionInfo, ApiError> {
        let envelope: Envelope<CollectionInfo> = self
            .request::<serde_json::Value, _>(
                reqwest::Method::GET,
                &format!("/collections/{name}"),
                None,
            )
            .await?;
        Ok(envelope.result)
    }

    /// Upserts points in sub-batches of [`UPSERT_SUB_BATCH`], waiting for
    /// server acknowledgment. Transient failures are retried up to
    /// [`UPSERT_ATTEMPTS`] times with a linear 1 s backoff.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when a sub-batch fails after retries.
    pub async fn upsert(&self, name: &str, points: &[Point]) -> Result<(), ApiError> {
        for sub_batch in points.chunks(UPSERT_SUB_BATCH) {
            let body = json!({
                "points": sub_batch
                    .iter()
                    .map(|p| {
                        json!({
                            "id": p.id.to_string(),
                            "vector": {
                                DENSE_VECTOR: p.dense,
                                BM25_VECTOR: {"text": p.bm25_text, "model": BM25_MODEL},
                            },
                            "payload": p.payload,
                        })
                    })
                    .collect::<Vec<_>>(),
            });
            self.upsert_with_retry(name, &body).await?;
        }
        Ok(())
    }

    async fn upsert_with_retry(
        &self,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<(), ApiError> {
        let path = format!("/collections/{name}/points?wait=true");
        let mut attempt = 1u32;
        loop {
            let outcome: Result<Envelope<serde_json::Value>, ApiError> = self
                .request(reqwest::Method::PUT, &path, Some(body))
                .await;
            match outcome {
                Ok(_) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < UPSERT_ATTEMPTS => {
                    tracing::warn!(collection = name, attempt, error = %err, "retrying upsert");
                    tokio::time::sleep(UPSERT_BACKOFF).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Hybrid query: per-vector prefetch on `dense` and `bm25`, fused
    /// server-side with reciprocal-rank fusion.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the query fails.
    pub async fn query_hybrid(
        &self,
        name: &str,
        dense: &[f32],
        query_text: &str,
        limit: usize,
        rrf_k: u32,
    ) -> Result<Vec<ScoredPoint>, ApiError> {
        let body = json!({
            "prefetch": [
                {"query": dense, "using": DENSE_VECTOR, "limit": limit},
                {
                    "query": {"text": query_text, "model": BM25_MODEL},
                    "using": BM25_VECTOR,
                    "limit": limit,
                },
            ],
            "query": {"fusion": "rrf"},
            "params": {"rrf": {"k": rrf_k}},
            "limit": limit,
            "with_payload": true,
        });
        self.query_points(name, &body).await
    }

    /// Pure dense cosine query with an optional minimum-score filter.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the query fails.
    pub async fn query_dense(
        &self,
        name: &str,
        dense: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, ApiError> {
        let mut body = json!({
            "query": dense,
            "using": DENSE_VECTOR,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(threshold), Some(map)) = (score_threshold, body.as_object_mut()) {
            map.insert("score_threshold".to_string(), json!(threshold));
        }
        self.query_points(name, &body).await
    }

    /// Enumerates points whose payload `doc_id` equals the given id.
    /// Results carry a zero score; order is store-defined.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the scroll fails.
    pub async fn scroll_by_doc_id(
        &self,
        name: &str,
        doc_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, ApiError> {
        let body = json!({
            "filter": {"must": [{"key": "doc_id", "match": {"value": doc_id}}]},
            "limit": limit,
            "with_payload": true,
        });
        let envelope: Envelope<PointsResult> = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{name}/points/scroll"),
                Some(&body),
            )
            .await?;
        envelope.result.points.into_iter().map(parse_point).collect()
    }

    /// Deletes points by chunk string id, mapping each id through the
    /// stable UUID derivation.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the delete fails.
    pub async fn delete_points(&self, name: &str, chunk_ids: &[String]) -> Result<(), ApiError> {
        let body = json!({
            "points": chunk_ids
                .iter()
                .map(|id| point_id(id).to_string())
                .collect::<Vec<_>>(),
        });
        let _: Envelope<serde_json::Value> = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{name}/points/delete?wait=true"),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn query_points(
        &self,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<ScoredPoint>, ApiError> {
        let envelope: Envelope<PointsResult> = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{name}/points/query"),
                Some(body),
            )
            .await?;
        envelope.result.points.into_iter().map(parse_point).collect()
    }

    async fn request<B, R>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.request(method, &url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(ApiError::from)?;

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

fn parse_point(raw: RawPoint) -> Result<ScoredPoint, ApiError> {
    let payload: PointPayload =
        serde_json::from_value(raw.payload).map_err(|e| ApiError::InvalidResponse {
            message: format!("malformed point payload: {e}"),
        })?;
    let id = match raw.id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(ScoredPoint {
        id,
        score: raw.score.unwrap_or(0.0),
        payload,
    })
}
