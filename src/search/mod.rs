//! Hybrid search over a product collection.
//!
//! One [`Searcher`] per (product, language) pair, all sharing the
//! embedding client and the vector store client. The fusion mode follows
//! the cross-language degradation rule: lexical BM25 only helps when the
//! query is written in the corpus language, so foreign-language queries
//! drop to dense-only retrieval with a score floor.

pub mod language;

pub use language::{detect_language, normalize_lang};

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::ResolvedConfig;
use crate::core::ChunkMetadata;
use crate::embedding::VoyageClient;
use crate::error::{Error, SearchError};
use crate::store::{PointPayload, QdrantClient, ScoredPoint};
use crate::text::truncate_graphemes;

/// Hard cap on chunks returned for a single document.
pub const MAX_DOC_CHUNKS: usize = 100;

/// Characters kept in `content_preview`.
pub const PREVIEW_GRAPHEMES: usize = 200;

/// How the candidate set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Hybrid dense + BM25 with reciprocal-rank fusion.
    Rrf,
    /// Dense cosine only, used when query and corpus languages differ.
    DenseOnly,
}

/// One shaped search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based position in the response.
    pub rank: usize,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk id, `{doc_id}_chunk{N}`.
    pub chunk_id: String,
    /// Fusion or rerank score, non-increasing across the response.
    pub score: f32,
    /// Full chunk content.
    pub content: String,
    /// First [`PREVIEW_GRAPHEMES`] characters of the content.
    pub content_preview: String,
    /// Structural chunk metadata.
    pub metadata: ChunkMetadata,
}

/// Response of one search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query as received.
    pub query: String,
    /// Detected (or fallen-back) query language.
    pub detected_lang: String,
    /// Retrieval mode that produced the candidates.
    pub fusion_mode: FusionMode,
    /// Whether reranking was attempted.
    pub rerank_used: bool,
    /// Number of results returned.
    pub total: usize,
    /// Wall-clock search duration in milliseconds.
    pub duration_ms: u64,
    /// Shaped hits, best first.
    pub results: Vec<SearchResult>,
}

/// Search pipeline for one product collection.
pub struct Searcher {
    config: Arc<ResolvedConfig>,
    embedder: Arc<VoyageClient>,
    store: Arc<QdrantClient>,
}

impl Searcher {
    /// Creates a searcher over the product's collection.
    #[must_use]
    pub fn new(
        config: Arc<ResolvedConfig>,
        embedder: Arc<VoyageClient>,
        store: Arc<QdrantClient>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
        }
    }

    /// Product configuration this searcher serves.
    #[must_use]
    pub fn config(&self) -> &Arc<ResolvedConfig> {
        &self.config
    }

    /// Runs the full pipeline: language detection, query embedding,
    /// hybrid or dense retrieval, best-effort rerank, result shaping.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchError`] for empty queries, embedding failures,
    /// rate-limit refusals, and vector-store failures. Rerank failures
    /// are absorbed with a warning.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        use_rerank: Option<bool>,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let params = &self.config.search;
        let detected_lang = detect_language(
            query,
            params.min_detect_len,
            &self.config.doc_language,
        );

        let dense = self.embed_query(query).await?;

        let (fusion_mode, mut candidates) = if detected_lang == self.config.doc_language {
            let points = self
                .store
                .query_hybrid(
                    &self.config.collection,
                    &dense,
                    query,
                    params.prefetch_limit,
                    params.rrf_k,
                )
                .await
                .map_err(SearchError::Store)?;
            (FusionMode::Rrf, points)
        } else {
            let points = self
                .store
                .query_dense(
                    &self.config.collection,
                    &dense,
                    params.prefetch_limit,
                    Some(params.dense_score_threshold),
                )
                .await
                .map_err(SearchError::Store)?;
            (FusionMode::DenseOnly, points)
        };

        let rerank_used = use_rerank.unwrap_or(true);
        if rerank_used && !candidates.is_empty() {
            candidates = self.rerank_candidates(query, candidates).await;
        }

        let limit = limit.unwrap_or(params.rerank_top_k);
        candidates.truncate(limit);

        #[allow(clippy::cast_possible_truncation)]
        let response = SearchResponse {
            query: query.to_string(),
            detected_lang,
            fusion_mode,
            rerank_used,
            total: candidates.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            results: shape_results(candidates),
        };
        Ok(response)
    }

    /// Fetches every chunk of one document, ordered by `chunk_index`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Store`] when the scroll fails.
    pub async fn get_doc_chunks(&self, doc_id: &str) -> Result<Vec<PointPayload>, SearchError> {
        let points = self
            .store
            .scroll_by_doc_id(&self.config.collection, doc_id, MAX_DOC_CHUNKS)
            .await
            .map_err(SearchError::Store)?;
        let mut payloads: Vec<PointPayload> = points.into_iter().map(|p| p.payload).collect();
        payloads.sort_by_key(|p| p.chunk_index);
        Ok(payloads)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        match self.embedder.embed_query(query).await {
            Ok(vector) => Ok(vector),
            Err(Error::RateLimit(e)) => Err(SearchError::RateLimited(e)),
            Err(Error::Api(e)) => Err(SearchError::Embedding(e)),
            Err(other) => Err(SearchError::Embedding(
                crate::error::ApiError::InvalidResponse {
                    message: other.to_string(),
                },
            )),
        }
    }

    /// Best-effort rerank: on any upstream failure the fused candidate
    /// order is kept and a warning is emitted.
    async fn rerank_candidates(
        &self,
        query: &str,
        candidates: Vec<ScoredPoint>,
    ) -> Vec<ScoredPoint> {
        let documents: Vec<String> = candidates
            .iter()
            .map(|c| c.payload.content.clone())
            .collect();
        let top_k = self.config.search.rerank_top_k.min(documents.len());
        match self.embedder.rerank(query, &documents, top_k).await {
            Ok(ranked) => ranked
                .into_iter()
                .filter_map(|(index, score)| {
                    candidates.get(index).map(|point| ScoredPoint {
                        id: point.id.clone(),
                        score,
                        payload: point.payload.clone(),
                    })
                })
                .collect(),
            Err(err) => {
                tracing::warn!(
                    collection = %self.config.collection,
                    error = %err,
                    "rerank failed, returning fusion order"
                );
                candidates
            }
        }
    }
}

fn shape_results(candidates: Vec<ScoredPoint>) -> Vec<SearchResult> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, point)| {
            let chunk_id = format!("{}_chunk{}", point.payload.doc_id, point.payload.chunk_index);
            SearchResult {
                rank: i + 1,
                doc_id: point.payload.doc_id.clone(),
                chunk_id,
                score: point.score,
                content_preview: truncate_graphemes(&point.payload.content, PREVIEW_GRAPHEMES),
                content: point.payload.content,
                metadata: point.payload.metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkerKind, SearchParams};
    use crate::core::Category;
    use crate::limiter::RateLimiter;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(doc_language: &str) -> Arc<ResolvedConfig> {
        Arc::new(ResolvedConfig {
            product_id: "spreadjs".to_string(),
            name: "SpreadJS".to_string(),
            company_short: "GR".to_string(),
            chunker: ChunkerKind::Typedoc,
            doc_subdirs: vec!["apis".to_string()],
            search: SearchParams::default(),
            instructions: None,
            min_chunk_size: 100,
            lang: "en".to_string(),
            doc_language: doc_language.to_string(),
            collection: "spreadjs_en".to_string(),
            raw_data: "spreadjs_en".to_string(),
            description: None,
            resources: std::collections::BTreeMap::new(),
        })
    }

    fn searcher(
        doc_language: &str,
        voyage_url: &str,
        qdrant_url: &str,
    ) -> Searcher {
        let limiter = Arc::new(RateLimiter::new(10_000, 100_000_000));
        let embedder = Arc::new(
            VoyageClient::new("k", "voyage-code-3", "rerank-2.5", 128, limiter)
                .with_base_url(voyage_url),
        );
        let store = Arc::new(QdrantClient::new(qdrant_url, None));
        Searcher::new(config(doc_language), embedder, store)
    }

    async fn mock_query_embedding(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "data": [{"embedding": vec![0.1f32; 1024], "index": 0}],
                }));
            })
            .await;
    }

    fn point_json(doc_id: &str, chunk_index: usize, score: f32) -> serde_json::Value {
        json!({
            "id": format!("00000000-0000-5000-8000-00000000000{chunk_index}"),
            "score": score,
            "payload": {
                "content": format!("content for {doc_id} chunk {chunk_index}"),
                "doc_id": doc_id,
                "chunk_index": chunk_index,
                "metadata": {
                    "relative_path": "apis/Workbook.md",
                    "category": "api",
                    "path_hierarchy": ["apis", "Workbook.md"],
                    "section_path": [],
                    "doc_toc": "",
                    "total_chunks": 3
                }
            }
        })
    }

    #[tokio::test]
    async fn test_same_language_uses_rrf() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_query_embedding(&voyage).await;
        let hybrid = qdrant
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/spreadjs_en/points/query")
                    .json_body_partial(r#"{"query": {"fusion": "rrf"}}"#);
                then.status(200).json_body(json!({
                    "result": {"points": [point_json("apis_Workbook", 0, 0.9)]},
                }));
            })
            .await;

        let searcher = searcher("zh", &voyage.base_url(), &qdrant.base_url());
        // Four characters: below the detection minimum, falls back to the
        // corpus language.
        let response = searcher
            .search("条件格式", Some(3), Some(false))
            .await
            .unwrap();

        assert_eq!(response.fusion_mode, FusionMode::Rrf);
        assert_eq!(response.detected_lang, "zh");
        assert!(response.results.len() <= 3);
        hybrid.assert_async().await;
    }

    #[tokio::test]
    async fn test_cross_language_uses_dense_only() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_query_embedding(&voyage).await;
        let dense = qdrant
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/spreadjs_en/points/query")
                    .json_body_partial(r#"{"score_threshold": 0.3}"#);
                then.status(200).json_body(json!({
                    "result": {"points": [point_json("apis_Workbook", 0, 0.55)]},
                }));
            })
            .await;

        let searcher = searcher("zh", &voyage.base_url(), &qdrant.base_url());
        let response = searcher
            .search("conditional formatting rules", None, Some(false))
            .await
            .unwrap();

        assert_eq!(response.fusion_mode, FusionMode::DenseOnly);
        assert_eq!(response.detected_lang, "en");
        dense.assert_async().await;
    }

    #[tokio::test]
    async fn test_rerank_reorders_and_rescores() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_query_embedding(&voyage).await;
        voyage
            .mock_async(|when, then| {
                when.method(POST).path("/v1/rerank");
                then.status(200).json_body(json!({
                    "data": [
                        {"index": 1, "relevance_score": 0.95},
                        {"index": 0, "relevance_score": 0.40}
                    ]
                }));
            })
            .await;
        qdrant
            .mock_async(|when, then| {
                when.method(POST).path("/collections/spreadjs_en/points/query");
                then.status(200).json_body(json!({
                    "result": {"points": [
                        point_json("apis_Workbook", 0, 0.8),
                        point_json("apis_Cell", 1, 0.7),
                    ]},
                }));
            })
            .await;

        let searcher = searcher("en", &voyage.base_url(), &qdrant.base_url());
        let response = searcher
            .search("workbook cell formatting", None, None)
            .await
            .unwrap();

        assert!(response.rerank_used);
        assert_eq!(response.results[0].doc_id, "apis_Cell");
        assert!((response.results[0].score - 0.95).abs() < f32::EPSILON);
        assert_eq!(response.results[0].rank, 1);
        assert_eq!(response.results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_rerank_failure_absorbed() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_query_embedding(&voyage).await;
        voyage
            .mock_async(|when, then| {
                when.method(POST).path("/v1/rerank");
                then.status(400).body("rerank broken");
            })
            .await;
        qdrant
            .mock_async(|when, then| {
                when.method(POST).path("/collections/spreadjs_en/points/query");
                then.status(200).json_body(json!({
                    "result": {"points": [
                        point_json("apis_Workbook", 0, 0.8),
                        point_json("apis_Cell", 1, 0.7),
                    ]},
                }));
            })
            .await;

        let searcher = searcher("en", &voyage.base_url(), &qdrant.base_url());
        let response = searcher
            .search("workbook cell formatting", None, None)
            .await
            .unwrap();

        // Rerank was attempted but failed; fusion order survives.
        assert!(response.rerank_used);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].doc_id, "apis_Workbook");
        assert!((response.results[0].score - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        let searcher = searcher("en", &voyage.base_url(), &qdrant.base_url());
        let err = searcher.search("   ", None, None).await.unwrap_err();
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_query_embedding(&voyage).await;
        qdrant
            .mock_async(|when, then| {
                when.method(POST).path("/collections/spreadjs_en/points/query");
                then.status(500).body("boom");
            })
            .await;

        let searcher = searcher("en", &voyage.base_url(), &qdrant.base_url());
        let err = searcher
            .search("workbook cell formatting", None, Some(false))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Store(_)));
    }

    #[tokio::test]
    async fn test_get_doc_chunks_sorted() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        qdrant
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/spreadjs_en/points/scroll");
                then.status(200).json_body(json!({
                    "result": {"points": [
                        point_json("apis_Workbook", 2, 0.0),
                        point_json("apis_Workbook", 0, 0.0),
                        point_json("apis_Workbook", 1, 0.0),
                    ], "next_page_offset": null},
                }));
            })
            .await;

        let searcher = searcher("en", &voyage.base_url(), &qdrant.base_url());
        let chunks = searcher.get_doc_chunks("apis_Workbook").await.unwrap();
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_preview_truncation() {
        let long = "x".repeat(500);
        let results = shape_results(vec![ScoredPoint {
            id: "p".to_string(),
            score: 0.5,
            payload: PointPayload {
                content: long,
                doc_id: "docs_intro".to_string(),
                chunk_index: 0,
                metadata: ChunkMetadata {
                    relative_path: "docs/intro.md".to_string(),
                    category: Category::Doc,
                    path_hierarchy: vec![],
                    section_path: vec![],
                    doc_toc: String::new(),
                    total_chunks: 1,
                },
            },
        }]);
        assert_eq!(results[0].content_preview.len(), PREVIEW_GRAPHEMES);
        assert_eq!(results[0].content.len(), 500);
        assert_eq!(results[0].chunk_id, "docs_intro_chunk0");
    }
}
