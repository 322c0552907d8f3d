//! Error types for docdex operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! docdex operations: configuration, rate limiting, upstream API calls,
//! search, and ingestion. The five sub-kinds are the boundary currency of
//! the system; `Error` is the top-level union used by the CLI and tests.

use thiserror::Error;

/// Result type alias for docdex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error union for docdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (environment, YAML descriptors). Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rate-limit violations, carrying a retry-after hint.
    #[error("rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Upstream HTTP errors (embedding, rerank, vector store).
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Search pipeline failures surfaced to the tool layer.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// Per-batch ingestion failures; the checkpoint stays for resumption.
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// I/O errors (corpus reads, checkpoint writes).
    #[error("I/O error: {0}")]
    Io(String),
}

/// Configuration errors: missing environment, unreadable or invalid YAML.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable: {name}")]
    MissingEnv {
        /// Name of the missing variable.
        name: String,
    },

    /// An environment variable is set but unparsable.
    #[error("invalid value for {name}: {message}")]
    InvalidEnv {
        /// Name of the offending variable.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A product or variant descriptor file is missing.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was probed.
        path: String,
    },

    /// YAML parsing failed.
    #[error("failed to parse {path}: {message}")]
    Yaml {
        /// Path of the file that failed to parse.
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Schema validation failed; lists every offending field.
    #[error("validation failed for {path}: {}", fields.join(", "))]
    Validation {
        /// Path of the descriptor that failed validation.
        path: String,
        /// Offending fields with short diagnostics.
        fields: Vec<String>,
    },
}

/// Rate-limit violations. Both variants carry the seconds to wait before
/// the window has room again.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The per-window request ceiling would be exceeded.
    #[error("request limit exceeded, retry after {retry_after_secs}s")]
    Requests {
        /// Seconds until the earliest window entry expires.
        retry_after_secs: u64,
    },

    /// The per-window token ceiling would be exceeded.
    #[error("token limit exceeded, retry after {retry_after_secs}s")]
    Tokens {
        /// Seconds until the earliest window entry expires.
        retry_after_secs: u64,
    },
}

impl RateLimitError {
    /// Seconds the caller should wait before retrying.
    #[must_use]
    pub const fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Requests { retry_after_secs } | Self::Tokens { retry_after_secs } => {
                *retry_after_secs
            }
        }
    }
}

/// Upstream HTTP errors from the embedding provider or the vector store.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success HTTP status from upstream.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Connection-level failure (reset, refused, DNS).
    #[error("network error: {message}")]
    Network {
        /// Transport diagnostic.
        message: String,
    },

    /// The request timed out.
    #[error("request timed out: {message}")]
    Timeout {
        /// Which call timed out.
        message: String,
    },

    /// Upstream returned a body the client could not interpret.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was malformed.
        message: String,
    },

    /// A returned vector's length differs from the model's declared dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension declared for the model.
        expected: usize,
        /// Dimension actually returned.
        actual: usize,
    },
}

impl ApiError {
    /// Whether the failure is transient and worth retrying: network-level
    /// failures, timeouts, 5xx, and 429.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse { .. } | Self::DimensionMismatch { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Search pipeline failures. Rerank failures never appear here; they are
/// absorbed with a warning and the fused candidates are returned instead.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The query was empty after trimming.
    #[error("query must not be empty")]
    EmptyQuery,

    /// Query embedding failed.
    #[error("query embedding failed: {0}")]
    Embedding(#[source] ApiError),

    /// The vector store query failed.
    #[error("vector store query failed: {0}")]
    Store(#[source] ApiError),

    /// The rate limiter refused the query embedding.
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),
}

/// Per-batch ingestion failures. The run aborts, the checkpoint stays.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// A batch failed to embed or upsert.
    #[error("batch {batch_index} failed: {source}")]
    Batch {
        /// Zero-based index of the failed batch.
        batch_index: usize,
        /// Underlying failure.
        #[source]
        source: ApiError,
    },

    /// The rate limiter refused a batch; resume after the hint elapses.
    #[error("batch {batch_index} rate limited: {source}")]
    RateLimited {
        /// Zero-based index of the refused batch.
        batch_index: usize,
        /// Underlying limiter error with the retry-after hint.
        #[source]
        source: RateLimitError,
    },

    /// Checkpoint file could not be read or written.
    #[error("checkpoint error at {path}: {message}")]
    Checkpoint {
        /// Checkpoint file path.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// No documents were found under the corpus directories.
    #[error("no documents found under {base_dir}")]
    EmptyCorpus {
        /// Base directory that was scanned.
        base_dir: String,
    },
}

// Implement From traits for standard library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
