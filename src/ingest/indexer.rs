//! Resumable batch ingestion.
//!
//! Batches are strictly sequential: a checkpoint is written only after its
//! batch is acknowledged by the store, so a crash between batches costs at
//! most one batch of rework and never skips a chunk.

use std::sync::Arc;
use std::time::Instant;

use crate::core::Chunk;
use crate::embedding::VoyageClient;
use crate::error::{Error, IngestionError, Result};
use crate::ingest::resume::CheckpointStore;
use crate::store::{Point, PointPayload, QdrantClient};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks presented to the indexer.
    pub total: usize,
    /// Chunks embedded and upserted during this run.
    pub succeeded: usize,
    /// Chunks that failed. Always zero on a clean run; failures abort.
    pub failed: usize,
    /// Chunks skipped because a checkpoint covered them.
    pub skipped: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Orchestrates embed + upsert of an in-memory chunk list.
pub struct Indexer {
    embedder: Arc<VoyageClient>,
    store: Arc<QdrantClient>,
    checkpoints: CheckpointStore,
    collection: String,
    batch_size: usize,
}

impl Indexer {
    /// Creates an indexer writing into `collection`.
    #[must_use]
    pub fn new(
        embedder: Arc<VoyageClient>,
        store: Arc<QdrantClient>,
        checkpoints: CheckpointStore,
        collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            checkpoints,
            collection: collection.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Ensures the collection exists, recreating it when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Api`] when the store rejects a request.
    pub async fn init_collection(&self, force: bool) -> Result<()> {
        let exists = self.store.collection_exists(&self.collection).await?;
        if exists && force {
            tracing::info!(collection = %self.collection, "dropping collection");
            self.store.delete_collection(&self.collection).await?;
        }
        if !exists || force {
            tracing::info!(
                collection = %self.collection,
                dim = self.embedder.dimension(),
                "creating collection"
            );
            self.store
                .create_collection(&self.collection, self.embedder.dimension())
                .await?;
        }
        Ok(())
    }

    /// Embeds and upserts `chunks`, resuming from the checkpoint when one
    /// is present. The checkpoint is advanced after every acknowledged
    /// batch and removed on clean completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ingestion`] when a batch fails; the checkpoint is
    /// left pointing at the last acknowledged batch so the next run
    /// resumes there.
    pub async fn run(&self, chunks: &[Chunk]) -> Result<IngestReport> {
        let started = Instant::now();
        let total = chunks.len();

        let resume_from = match self.checkpoints.load().await? {
            Some(checkpoint) => {
                let position = chunks
                    .iter()
                    .position(|c| c.id == checkpoint.last_processed_chunk_id);
                match position {
                    Some(i) => {
                        tracing::info!(
                            collection = %self.collection,
                            resume_after = %checkpoint.last_processed_chunk_id,
                            "resuming from checkpoint"
                        );
                        i + 1
                    }
                    None => {
                        tracing::warn!(
                            collection = %self.collection,
                            "checkpoint chunk not found in corpus, restarting"
                        );
                        0
                    }
                }
            }
            None => 0,
        };

        let mut succeeded = 0usize;
        for (batch_index, batch) in chunks[resume_from..].chunks(self.batch_size).enumerate() {
            self.run_batch(batch_index, batch).await?;
            succeeded += batch.len();
            if let Some(last) = batch.last() {
                self.checkpoints.write(&last.id).await?;
            }
            tracing::debug!(
                collection = %self.collection,
                batch_index,
                batch_len = batch.len(),
                "batch acknowledged"
            );
        }

        self.checkpoints.clear().await?;

        #[allow(clippy::cast_possible_truncation)]
        let report = IngestReport {
            total,
            succeeded,
            failed: 0,
            skipped: resume_from,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            collection = %self.collection,
            total = report.total,
            succeeded = report.succeeded,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn run_batch(&self, batch_index: usize, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| batch_error(batch_index, e))?;

        let points: Vec<Point> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, dense)| Point {
                id: chunk.point_id(),
                dense,
                bm25_text: chunk.content.clone(),
                payload: PointPayload {
                    content: chunk.content.clone(),
                    doc_id: chunk.doc_id.clone(),
                    chunk_index: chunk.chunk_index,
                    metadata: chunk.metadata.clone(),
                },
            })
            .collect();

        self.store
            .upsert(&self.collection, &points)
            .await
            .map_err(|e| {
                Error::Ingestion(IngestionError::Batch {
                    batch_index,
                    source: e,
                })
            })?;
        Ok(())
    }
}

/// Maps an embedder failure to the ingestion error kind, keeping the
/// rate-limit retry-after visible to the operator.
fn batch_error(batch_index: usize, err: Error) -> Error {
    match err {
        Error::RateLimit(source) => {
            Error::Ingestion(IngestionError::RateLimited { batch_index, source })
        }
        Error::Api(source) => Error::Ingestion(IngestionError::Batch {
            batch_index,
            source,
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, ChunkMetadata};
    use crate::limiter::RateLimiter;
    use httpmock::prelude::*;
    use serde_json::json;

    fn chunk(doc_id: &str, index: usize) -> Chunk {
        Chunk::new(
            doc_id,
            index,
            format!("chunk content {index}"),
            ChunkMetadata {
                relative_path: "docs/test.md".to_string(),
                category: Category::Doc,
                path_hierarchy: vec!["docs".to_string()],
                section_path: vec![],
                doc_toc: String::new(),
                total_chunks: 4,
            },
        )
    }

    fn embedder(base_url: &str) -> Arc<VoyageClient> {
        let limiter = Arc::new(RateLimiter::new(10_000, 100_000_000));
        Arc::new(
            VoyageClient::new("k", "voyage-code-3", "rerank-2.5", 128, limiter)
                .with_base_url(base_url),
        )
    }

    async fn mock_embeddings(server: &MockServer) {
        // Batches in these tests are always two chunks wide.
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "data": [
                        {"embedding": vec![0.5f32; 1024], "index": 0},
                        {"embedding": vec![0.5f32; 1024], "index": 1},
                    ],
                }));
            })
            .await;
    }

    #[tokio::test]
    async fn test_run_writes_checkpoint_and_clears() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_embeddings(&voyage).await;
        qdrant
            .mock_async(|when, then| {
                when.method(PUT).path_contains("/points");
                then.status(200)
                    .json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::new(dir.path(), "spreadjs");
        let indexer = Indexer::new(
            embedder(&voyage.base_url()),
            Arc::new(QdrantClient::new(qdrant.base_url(), None)),
            checkpoints.clone(),
            "spreadjs_en",
            2,
        );

        let chunks: Vec<Chunk> = (0..4).map(|i| chunk("docs_test", i)).collect();
        let report = indexer.run(&chunks).await.unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
        // Clean completion removes the checkpoint.
        assert!(checkpoints.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_checkpoint() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_embeddings(&voyage).await;
        // Store rejects everything with a permanent error.
        qdrant
            .mock_async(|when, then| {
                when.method(PUT).path_contains("/points");
                then.status(400).body("bad vectors");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::new(dir.path(), "spreadjs");
        let indexer = Indexer::new(
            embedder(&voyage.base_url()),
            Arc::new(QdrantClient::new(qdrant.base_url(), None)),
            checkpoints.clone(),
            "spreadjs_en",
            2,
        );

        let chunks: Vec<Chunk> = (0..4).map(|i| chunk("docs_test", i)).collect();
        let err = indexer.run(&chunks).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Ingestion(IngestionError::Batch { batch_index: 0, .. })
        ));
        // No batch succeeded, so no checkpoint was written.
        assert!(checkpoints.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_skips_acknowledged_chunks() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        mock_embeddings(&voyage).await;
        let upserts = qdrant
            .mock_async(|when, then| {
                when.method(PUT).path_contains("/points");
                then.status(200)
                    .json_body(json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointStore::new(dir.path(), "spreadjs");
        // Simulate a previous run that acknowledged the first batch.
        checkpoints.write("docs_test_chunk1").await.unwrap();

        let indexer = Indexer::new(
            embedder(&voyage.base_url()),
            Arc::new(QdrantClient::new(qdrant.base_url(), None)),
            checkpoints.clone(),
            "spreadjs_en",
            2,
        );

        let chunks: Vec<Chunk> = (0..4).map(|i| chunk("docs_test", i)).collect();
        let report = indexer.run(&chunks).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.succeeded, 2);
        // Only the second batch reached the store.
        upserts.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_init_collection_force_recreates() {
        let voyage = MockServer::start_async().await;
        let qdrant = MockServer::start_async().await;
        qdrant
            .mock_async(|when, then| {
                when.method(GET).path("/collections/spreadjs_en/exists");
                then.status(200).json_body(json!({"result": {"exists": true}}));
            })
            .await;
        let deletes = qdrant
            .mock_async(|when, then| {
                when.method(DELETE).path("/collections/spreadjs_en");
                then.status(200).json_body(json!({"result": true}));
            })
            .await;
        let creates = qdrant
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/spreadjs_en");
                then.status(200).json_body(json!({"result": true}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let indexer = Indexer::new(
            embedder(&voyage.base_url()),
            Arc::new(QdrantClient::new(qdrant.base_url(), None)),
            CheckpointStore::new(dir.path(), "spreadjs"),
            "spreadjs_en",
            2,
        );

        indexer.init_collection(true).await.unwrap();
        deletes.assert_hits_async(1).await;
        creates.assert_hits_async(1).await;

        indexer.init_collection(false).await.unwrap();
        // Existing collection without force: untouched.
        deletes.assert_hits_async(1).await;
        creates.assert_hits_async(1).await;
    }
}
