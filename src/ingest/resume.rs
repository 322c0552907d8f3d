//! Resume support for long-running ingestion jobs.
//!
//! After every successfully upserted batch the indexer persists the last
//! processed chunk id. A rerun picks up right after it; a clean completion
//! removes the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestionError;

/// Persisted ingestion progress for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Id of the last chunk whose batch was fully upserted.
    pub last_processed_chunk_id: String,
    /// When the batch was acknowledged.
    pub timestamp: DateTime<Utc>,
}

/// Reads and writes the checkpoint file for one product.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store at `checkpoints/checkpoint-{product}.json` under
    /// the given directory.
    #[must_use]
    pub fn new(checkpoints_dir: &Path, product: &str) -> Self {
        Self {
            path: checkpoints_dir.join(format!("checkpoint-{product}.json")),
        }
    }

    /// Path of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Checkpoint`] when the file exists but
    /// cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<Checkpoint>, IngestionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error(e.to_string()))?;
        let checkpoint = serde_json::from_str(&data).map_err(|e| self.error(e.to_string()))?;
        Ok(Some(checkpoint))
    }

    /// Writes a checkpoint for the given chunk id.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Checkpoint`] when the file cannot be
    /// written.
    pub async fn write(&self, last_processed_chunk_id: &str) -> Result<(), IngestionError> {
        let checkpoint = Checkpoint {
            last_processed_chunk_id: last_processed_chunk_id.to_string(),
            timestamp: Utc::now(),
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e.to_string()))?;
        }
        let serialized =
            serde_json::to_string_pretty(&checkpoint).map_err(|e| self.error(e.to_string()))?;
        tokio::fs::write(&self.path, serialized)
            .await
            .map_err(|e| self.error(e.to_string()))
    }

    /// Removes the checkpoint after a clean completion. Missing files are
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Checkpoint`] when the file exists but
    /// cannot be removed.
    pub async fn clear(&self) -> Result<(), IngestionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(e.to_string())),
        }
    }

    fn error(&self, message: String) -> IngestionError {
        IngestionError::Checkpoint {
            path: self.path.display().to_string(),
            message,
        }
    }
}
