//! Offline ingestion: corpus → chunks → embeddings → vector store.
//!
//! The pipeline is strictly sequential within one product so that
//! checkpoint semantics stay correct under crash recovery. Multiple
//! products are ingested by separate invocations.

pub mod indexer;
pub mod resume;

pub use indexer::{IngestReport, Indexer};
pub use resume::{Checkpoint, CheckpointStore};
