//! # docdex
//!
//! Documentation retrieval service for AI coding agents.
//!
//! docdex ingests product documentation corpora into a vector store with
//! both dense embeddings and BM25 sparse vectors, then serves hybrid
//! search through a session-oriented Model Context Protocol endpoint per
//! product, all multiplexed on one HTTP server.
//!
//! ## Features
//!
//! - **Chunking**: three strategies (markdown, typedoc, javadoc) with
//!   preserved code blocks and structural metadata
//! - **Hybrid retrieval**: dense + BM25 with server-side RRF fusion and
//!   cross-encoder reranking
//! - **Resumable ingestion**: checkpointed batch embed + upsert
//! - **Session pool**: per-product MCP sessions with TTL reaping

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod limiter;
pub mod loader;
pub mod logging;
pub mod mcp;
pub mod search;
pub mod store;
pub mod text;

// Re-export commonly used types at crate root
pub use error::{ApiError, ConfigError, Error, IngestionError, RateLimitError, Result, SearchError};

// Re-export core domain types
pub use core::{Category, Chunk, ChunkMetadata, SourceDocument};

// Re-export configuration types
pub use config::{ChunkerKind, ConfigResolver, ResolvedConfig, SearchParams, Settings};

// Re-export pipeline types
pub use chunking::{Chunker, ChunkerOptions, create_chunker};
pub use embedding::VoyageClient;
pub use ingest::{IngestReport, Indexer};
pub use limiter::RateLimiter;
pub use loader::DocumentLoader;
pub use store::QdrantClient;

// Re-export the online plane
pub use mcp::{AppState, McpServer, ProductState, SessionPool};
pub use search::{FusionMode, SearchResponse, SearchResult, Searcher};

// Re-export CLI types
pub use cli::{Cli, Commands};
