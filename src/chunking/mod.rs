//! Chunking strategies for docdex.
//!
//! This module provides a trait-based system for cutting documents into
//! retrievable chunks with preserved code blocks and structural metadata.
//! Three strategies are available, selected per product:
//!
//! - **Markdown**: header-driven splitting for hand-written guides
//! - **TypeDoc**: member accumulation for TypeDoc-generated API pages
//! - **JavaDoc**: method grouping for JavaDoc-generated API pages
//!
//! All strategies share the splitting primitives in [`primitives`] and the
//! post-pass in [`finalize`], which discards degenerate chunks, assigns
//! dense indices, and back-fills `total_chunks` and the document outline.

pub mod javadoc;
pub mod markdown;
pub mod primitives;
pub mod typedoc;

pub use javadoc::JavaDocChunker;
pub use markdown::MarkdownChunker;
pub use typedoc::TypeDocChunker;

use crate::config::ChunkerKind;
use crate::core::{Chunk, ChunkMetadata, SourceDocument};
use crate::error::{ConfigError, Result};
use primitives::extract_toc;

/// Trait for chunking documents into ordered, retrievable segments.
///
/// Implementations must be `Send + Sync`; one chunker instance serves a
/// whole product corpus. Output is deterministic for the same input.
pub trait Chunker: Send + Sync {
    /// Cuts a document into ordered chunks.
    ///
    /// The returned chunks have dense indices `0..total_chunks` and carry
    /// the document outline and their section breadcrumb.
    fn chunk(&self, doc: &SourceDocument) -> Vec<Chunk>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;
}

/// Size options shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerOptions {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Chunks smaller than this are discarded unless they are a
    /// document's only chunk.
    pub min_chunk_size: usize,
}

impl ChunkerOptions {
    /// Creates options, validating that the sizes are coherent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `chunk_size` is zero or not larger
    /// than `min_chunk_size`.
    pub fn new(chunk_size: usize, min_chunk_size: usize) -> std::result::Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "CHUNK_SIZE".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if min_chunk_size >= chunk_size {
            return Err(ConfigError::InvalidEnv {
                name: "CHUNK_SIZE".to_string(),
                message: format!("must be larger than min_chunk_size {min_chunk_size}"),
            });
        }
        Ok(Self {
            chunk_size,
            min_chunk_size,
        })
    }
}

/// Creates the chunker for a product's configured strategy.
///
/// # Errors
///
/// Returns a [`ConfigError`] when the options are invalid.
pub fn create_chunker(
    kind: ChunkerKind,
    chunk_size: usize,
    min_chunk_size: usize,
) -> Result<Box<dyn Chunker>> {
    let options = ChunkerOptions::new(chunk_size, min_chunk_size)?;
    Ok(match kind {
        ChunkerKind::Markdown => Box::new(MarkdownChunker::new(options)),
        ChunkerKind::Typedoc => Box::new(TypeDocChunker::new(options)),
        ChunkerKind::Javadoc => Box::new(JavaDocChunker::new(options)),
    })
}

/// A chunk before indexing: content plus its section breadcrumb.
#[derive(Debug, Clone)]
pub(crate) struct RawChunk {
    pub content: String,
    pub section_path: Vec<String>,
}

impl RawChunk {
    pub(crate) fn new(content: String, section_path: Vec<String>) -> Self {
        Self {
            content,
            section_path,
        }
    }
}

/// Shared post-pass: discards whitespace-only pieces, drops pieces under
/// `min_chunk_size` when the document has siblings, assigns dense
/// indices, and back-fills `total_chunks` and `doc_toc`.
pub(crate) fn finalize(
    doc: &SourceDocument,
    pieces: Vec<RawChunk>,
    min_chunk_size: usize,
) -> Vec<Chunk> {
    let mut kept: Vec<RawChunk> = pieces
        .into_iter()
        .filter(|p| !p.content.trim().is_empty())
        .collect();
    if kept.len() > 1 {
        kept.retain(|p| p.content.trim().len() >= min_chunk_size);
    }

    let doc_toc = extract_toc(&doc.content);
    let total_chunks = kept.len();
    kept.into_iter()
        .enumerate()
        .map(|(index, piece)| {
            Chunk::new(
                &doc.id,
                index,
                piece.content,
                ChunkMetadata {
                    relative_path: doc.metadata.relative_path.clone(),
                    category: doc.metadata.category,
                    path_hierarchy: doc.metadata.path_hierarchy.clone(),
                    section_path: piece.section_path,
                    doc_toc: doc_toc.clone(),
                    total_chunks,
                },
            )
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn test_doc(content: &str, category: crate::core::Category) -> SourceDocument {
    use crate::core::DocumentMetadata;
    let relative_path = match category {
        crate::core::Category::Api => "apis/Test.md",
        crate::core::Category::Doc => "docs/test.md",
        crate::core::Category::Demo => "demos/test.md",
    };
    SourceDocument::new(
        content.to_string(),
        DocumentMetadata {
            relative_path: relative_path.to_string(),
            name: "test".to_string(),
            category,
            path_hierarchy: relative_path.split('/').map(str::to_string).collect(),
        },
    )
}
