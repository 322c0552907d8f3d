//! Core domain models for docdex.
//!
//! This module contains the fundamental data structures used throughout the
//! system: source documents and the retrievable chunks cut from them. These
//! are pure domain models with no I/O dependencies.

pub mod chunk;
pub mod document;

pub use chunk::{Chunk, ChunkMetadata, point_id};
pub use document::{Category, DocumentMetadata, SourceDocument, doc_id_from_path};
