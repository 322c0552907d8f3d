//! Configuration for docdex.
//!
//! Two layers: process-wide [`Settings`] read from the environment, and
//! per-(product, language) [`ResolvedConfig`] read from YAML descriptors
//! under `products/`. Both fail closed with a [`ConfigError`] naming the
//! offending variable or fields.

pub mod product;

pub use product::{
    ChunkerKind, ConfigResolver, ProductDescriptor, ResolvedConfig, ResourceEntry, SearchParams,
    VariantDescriptor,
};

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default HTTP port for the online service.
pub const DEFAULT_PORT: u16 = 8900;

/// Default chunk size in characters (~1,200 tokens at 2.5 chars/token).
pub const DEFAULT_CHUNK_SIZE: usize = 3_000;

/// Default embedding batch ceiling in inputs.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Process-wide settings resolved from the environment.
///
/// Call [`Settings::from_env`] once at startup, after `dotenvy` has had a
/// chance to populate the environment from a local `.env`.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Product ids to serve or index, from the comma-separated `PRODUCT`.
    pub products: Vec<String>,
    /// Default corpus language (`DOC_LANG`).
    pub doc_lang: String,
    /// Voyage API key (`VOYAGE_API_KEY`).
    pub voyage_api_key: String,
    /// Listen port (`PORT`).
    pub port: u16,
    /// Listen host (`HOST`).
    pub host: String,
    /// Qdrant base URL (`QDRANT_URL`).
    pub qdrant_url: String,
    /// Optional Qdrant API key (`QDRANT_API_KEY`).
    pub qdrant_api_key: Option<String>,
    /// Embedding model name (`VOYAGE_EMBED_MODEL`).
    pub embed_model: String,
    /// Rerank model name (`VOYAGE_RERANK_MODEL`).
    pub rerank_model: String,
    /// Requests-per-window ceiling (`VOYAGE_RPM_LIMIT`).
    pub rpm_limit: u32,
    /// Tokens-per-window ceiling (`VOYAGE_TPM_LIMIT`).
    pub tpm_limit: u64,
    /// Chunk size in characters (`CHUNK_SIZE`).
    pub chunk_size: usize,
    /// Embedding batch ceiling in inputs (`BATCH_SIZE`).
    pub batch_size: usize,
    /// Log filter (`LOG_LEVEL`).
    pub log_level: String,
    /// Directory holding product descriptors.
    pub products_dir: PathBuf,
    /// Directory holding raw corpora.
    pub raw_data_dir: PathBuf,
    /// Directory holding ingestion checkpoints.
    pub checkpoints_dir: PathBuf,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when a required variable is
    /// absent and [`ConfigError::InvalidEnv`] when a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let products = required("PRODUCT")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if products.is_empty() {
            return Err(ConfigError::InvalidEnv {
                name: "PRODUCT".to_string(),
                message: "expected a comma-separated list of product ids".to_string(),
            });
        }

        Ok(Self {
            products,
            doc_lang: required("DOC_LANG")?,
            voyage_api_key: required("VOYAGE_API_KEY")?,
            port: parsed("PORT", DEFAULT_PORT)?,
            host: var_or("HOST", "0.0.0.0"),
            qdrant_url: var_or("QDRANT_URL", "http://localhost:6333"),
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok().filter(|s| !s.is_empty()),
            embed_model: var_or("VOYAGE_EMBED_MODEL", "voyage-code-3"),
            rerank_model: var_or("VOYAGE_RERANK_MODEL", "rerank-2.5"),
            rpm_limit: parsed("VOYAGE_RPM_LIMIT", 2_000)?,
            tpm_limit: parsed("VOYAGE_TPM_LIMIT", 3_000_000)?,
            chunk_size: parsed("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            batch_size: parsed("BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            log_level: var_or("LOG_LEVEL", "info"),
            products_dir: PathBuf::from(var_or("PRODUCTS_DIR", "products")),
            raw_data_dir: PathBuf::from(var_or("RAW_DATA_DIR", "raw_data")),
            checkpoints_dir: PathBuf::from(var_or("CHECKPOINTS_DIR", "checkpoints")),
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv {
            name: name.to_string(),
        })
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse().map_err(|e| ConfigError::InvalidEnv {
            name: name.to_string(),
            message: format!("{e}"),
        }),
        _ => Ok(default),
    }
}

/// Whether a string is a valid lowercase identifier: `[a-z0-9_]+`.
///
/// Product ids, language codes, and collection names all share this
/// alphabet.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
#[allow(unsafe_code)] // std::env mutation is unsafe in edition 2024; test-only
mod tests {
    use super::*;

    // Environment-variable tests mutate process state; serialize them.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn with_base_env<F: FnOnce()>(f: F) {
        let _guard = ENV_LOCK.lock();
        unsafe {
            std::env::set_var("PRODUCT", "spreadjs");
            std::env::set_var("DOC_LANG", "en");
            std::env::set_var("VOYAGE_API_KEY", "test-key");
            std::env::remove_var("PORT");
            std::env::remove_var("VOYAGE_RPM_LIMIT");
        }
        f();
    }

    #[test]
    fn test_from_env_defaults() {
        with_base_env(|| {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.products, vec!["spreadjs".to_string()]);
            assert_eq!(settings.port, DEFAULT_PORT);
            assert_eq!(settings.embed_model, "voyage-code-3");
            assert_eq!(settings.rerank_model, "rerank-2.5");
            assert_eq!(settings.rpm_limit, 2_000);
            assert_eq!(settings.tpm_limit, 3_000_000);
            assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
            assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        });
    }

    #[test]
    fn test_missing_required_env() {
        let _guard = ENV_LOCK.lock();
        unsafe {
            std::env::remove_var("PRODUCT");
            std::env::set_var("DOC_LANG", "en");
            std::env::set_var("VOYAGE_API_KEY", "test-key");
        }
        let err = Settings::from_env().unwrap_err();
        assert!(err.to_string().contains("PRODUCT"));
    }

    #[test]
    fn test_product_list_parsing() {
        with_base_env(|| {
            unsafe {
                std::env::set_var("PRODUCT", "spreadjs, wijmo ,activereportsjs");
            }
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.products, vec!["spreadjs", "wijmo", "activereportsjs"]);
            unsafe {
                std::env::set_var("PRODUCT", "spreadjs");
            }
        });
    }

    #[test]
    fn test_invalid_port() {
        with_base_env(|| {
            unsafe {
                std::env::set_var("PORT", "not-a-port");
            }
            let err = Settings::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == "PORT"));
            unsafe {
                std::env::remove_var("PORT");
            }
        });
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("spreadjs_en"));
        assert!(is_identifier("a1_b2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("SpreadJS"));
        assert!(!is_identifier("spread-js"));
        assert!(!is_identifier("spread js"));
    }
}
