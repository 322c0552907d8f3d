//! Vector store access.
//!
//! A thin client over Qdrant's REST API. Every collection carries two
//! named vectors: `dense` (cosine) holding the embedding, and `bm25`, a
//! server-side sparse vector inferred from the chunk text with an IDF
//! modifier. The payload repeats the chunk content plus the metadata the
//! searcher returns to clients.

pub mod qdrant;

pub use qdrant::{CollectionInfo, QdrantClient};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ChunkMetadata;

/// Name of the dense vector in every collection.
pub const DENSE_VECTOR: &str = "dense";

/// Name of the BM25 sparse vector in every collection.
pub const BM25_VECTOR: &str = "bm25";

/// Server-side inference model used for the BM25 vector.
pub const BM25_MODEL: &str = "Qdrant/bm25";

/// Points per upsert call. The BM25 input repeats the full chunk text,
/// so upsert bodies are large; sub-batching keeps them bounded.
pub const UPSERT_SUB_BATCH: usize = 32;

/// Payload stored with every point and returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Chunk text.
    pub content: String,
    /// Parent document id.
    pub doc_id: String,
    /// Chunk position within the parent document.
    pub chunk_index: usize,
    /// Structural chunk metadata.
    pub metadata: ChunkMetadata,
}

/// A point ready for upsert: stable id, dense vector, BM25 input text,
/// and the retrievable payload.
#[derive(Debug, Clone)]
pub struct Point {
    /// Stable point id (UUID v5 of the chunk string id).
    pub id: Uuid,
    /// Dense embedding.
    pub dense: Vec<f32>,
    /// Text handed to the server-side BM25 inference.
    pub bm25_text: String,
    /// Retrievable payload.
    pub payload: PointPayload,
}

/// A point returned from a similarity or scroll query.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Point id as reported by the store.
    pub id: String,
    /// Similarity or fusion score; zero for scroll results.
    pub score: f32,
    /// Stored payload.
    pub payload: PointPayload,
}
