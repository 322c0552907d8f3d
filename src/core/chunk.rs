//! Chunk representation.
//!
//! Chunks are ordered slices of a document produced by the chunking
//! strategies. Each chunk carries the structural context needed at
//! retrieval time (section breadcrumb, full document outline) and maps to
//! a stable vector-store point id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Category;

/// Metadata stored with every chunk and returned in search payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the parent document relative to the corpus base.
    pub relative_path: String,
    /// Category inherited from the parent document.
    pub category: Category,
    /// Path components of the parent document.
    pub path_hierarchy: Vec<String>,
    /// Breadcrumb of enclosing headers, outermost first.
    pub section_path: Vec<String>,
    /// Indented header outline of the whole parent document.
    pub doc_toc: String,
    /// Number of chunks the parent document produced. Back-filled once the
    /// document finishes chunking.
    pub total_chunks: usize,
}

/// An ordered slice of a document, identified as `{doc_id}_chunk{N}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier, `{doc_id}_chunk{index}`.
    pub id: String,
    /// Identifier of the parent document.
    pub doc_id: String,
    /// Chunk text.
    pub content: String,
    /// Zero-based position within the parent document.
    pub chunk_index: usize,
    /// Structural and inherited metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Creates a chunk, deriving its id from the document id and index.
    #[must_use]
    pub fn new(doc_id: &str, chunk_index: usize, content: String, metadata: ChunkMetadata) -> Self {
        Self {
            id: format!("{doc_id}_chunk{chunk_index}"),
            doc_id: doc_id.to_string(),
            content,
            chunk_index,
            metadata,
        }
    }

    /// Stable vector-store point id for this chunk. See [`point_id`].
    #[must_use]
    pub fn point_id(&self) -> Uuid {
        point_id(&self.id)
    }

    /// Returns the size of the chunk content in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Checks if the chunk content is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Stable vector-store point id: a UUID v5 of the chunk's string id.
///
/// Pure function of the id, so re-ingesting the same chunks overwrites
/// the same points instead of duplicating them.
#[must_use]
pub fn point_id(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChunkMetadata {
        ChunkMetadata {
            relative_path: "apis/Workbook.md".to_string(),
            category: Category::Api,
            path_hierarchy: vec!["apis".to_string(), "Workbook.md".to_string()],
            section_path: vec!["Methods".to_string()],
            doc_toc: "Workbook\n  Methods".to_string(),
            total_chunks: 0,
        }
    }

    #[test]
    fn test_chunk_id_derivation() {
        let chunk = Chunk::new("apis_Workbook", 3, "content".to_string(), meta());
        assert_eq!(chunk.id, "apis_Workbook_chunk3");
        assert_eq!(chunk.doc_id, "apis_Workbook");
        assert_eq!(chunk.chunk_index, 3);
    }

    #[test]
    fn test_point_id_stable() {
        let a = Chunk::new("apis_Workbook", 0, "x".to_string(), meta());
        let b = Chunk::new("apis_Workbook", 0, "different content".to_string(), meta());
        // Point identity is a pure function of the chunk id, not the content.
        assert_eq!(a.point_id(), b.point_id());

        let c = Chunk::new("apis_Workbook", 1, "x".to_string(), meta());
        assert_ne!(a.point_id(), c.point_id());
    }

    #[test]
    fn test_is_blank() {
        let chunk = Chunk::new("d", 0, "  \n\t ".to_string(), meta());
        assert!(chunk.is_blank());
        let chunk = Chunk::new("d", 0, "text".to_string(), meta());
        assert!(!chunk.is_blank());
    }
}
