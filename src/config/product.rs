//! Product and language-variant descriptors.
//!
//! Each product is described by two YAML files under
//! `products/{product_id}/`: `product.yaml` (identity, chunker strategy,
//! corpus layout, search tuning, tool instructions) and `{lang}.yaml` (the
//! language variant: collection, raw-data location, guideline resources).
//! [`ConfigResolver`] loads, validates, and merges them into a
//! [`ResolvedConfig`], cached per `(product, lang)`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::is_identifier;
use crate::error::ConfigError;

/// Chunking strategy selector, one per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkerKind {
    /// Plain Markdown guides.
    Markdown,
    /// TypeDoc-generated API references.
    Typedoc,
    /// JavaDoc-generated API references.
    Javadoc,
}

/// Search tuning, merged over fixed defaults from the product descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Candidates fetched per vector before fusion.
    #[serde(default = "default_prefetch_limit")]
    pub prefetch_limit: usize,
    /// Candidates kept after reranking.
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
    /// Result count when the client does not pass a limit.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Minimum cosine score for dense-only queries.
    #[serde(default = "default_dense_score_threshold")]
    pub dense_score_threshold: f32,
    /// Minimum sparse score. Carried through configuration; the store's
    /// hybrid query has no slot for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_score_threshold: Option<f32>,
    /// Reciprocal-rank-fusion k parameter.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    /// Minimum query length (chars) before language detection is attempted.
    #[serde(default = "default_min_detect_len")]
    pub min_detect_len: usize,
}

const fn default_prefetch_limit() -> usize {
    20
}
const fn default_rerank_top_k() -> usize {
    10
}
const fn default_limit() -> usize {
    5
}
const fn default_dense_score_threshold() -> f32 {
    0.3
}
const fn default_rrf_k() -> u32 {
    60
}
const fn default_min_detect_len() -> usize {
    10
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            prefetch_limit: default_prefetch_limit(),
            rerank_top_k: default_rerank_top_k(),
            default_limit: default_limit(),
            dense_score_threshold: default_dense_score_threshold(),
            sparse_score_threshold: None,
            rrf_k: default_rrf_k(),
            min_detect_len: default_min_detect_len(),
        }
    }
}

/// `products/{id}/product.yaml` as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDescriptor {
    /// Product id; defaults to the directory name.
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable product name.
    pub name: String,
    /// Company name, used to derive `company_short`.
    #[serde(default)]
    pub company: Option<String>,
    /// Chunking strategy for this product's corpus.
    pub chunker: ChunkerKind,
    /// Corpus subdirectories to ingest, e.g. `[apis, docs, demos]`.
    pub doc_subdirs: Vec<String>,
    /// Search tuning merged over the defaults.
    #[serde(default)]
    pub search: SearchParams,
    /// Extra instructions appended to the MCP server instructions.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Minimum chunk size in characters; smaller chunks are discarded
    /// unless they are a document's only chunk.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

const fn default_min_chunk_size() -> usize {
    100
}

/// A guideline resource returned verbatim by the `get_code_guidelines`
/// tool and exposed under `guidelines://{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// MIME type declared on the MCP resource.
    pub mime_type: String,
    /// Resource body.
    pub content: String,
}

/// `products/{id}/{lang}.yaml` as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantDescriptor {
    /// Language code of this variant, e.g. `en`.
    pub lang: String,
    /// Language the documents are written in; drives fusion-mode selection.
    pub doc_language: String,
    /// Collection name; defaults to `{product}_{lang}`.
    #[serde(default)]
    pub collection: Option<String>,
    /// Corpus directory name under `raw_data/`.
    pub raw_data: String,
    /// Variant description for the service manifest.
    #[serde(default)]
    pub description: Option<String>,
    /// Guideline resources keyed by identifier.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceEntry>,
}

/// Fully merged configuration for one (product, language) pair.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Product identifier.
    pub product_id: String,
    /// Human-readable product name.
    pub name: String,
    /// First two letters of the company, uppercased.
    pub company_short: String,
    /// Chunking strategy.
    pub chunker: ChunkerKind,
    /// Corpus subdirectories to ingest.
    pub doc_subdirs: Vec<String>,
    /// Merged search tuning.
    pub search: SearchParams,
    /// Extra MCP instructions, if any.
    pub instructions: Option<String>,
    /// Minimum chunk size in characters.
    pub min_chunk_size: usize,
    /// Variant language code.
    pub lang: String,
    /// Language of the corpus documents.
    pub doc_language: String,
    /// Vector-store collection name.
    pub collection: String,
    /// Corpus directory name under `raw_data/`.
    pub raw_data: String,
    /// Variant description.
    pub description: Option<String>,
    /// Guideline resources.
    pub resources: BTreeMap<String, ResourceEntry>,
}

/// Loads and caches resolved product configurations.
///
/// The cache is write-once per `(product, lang)` key; there is no
/// time-based invalidation. Descriptor edits require a restart.
#[derive(Debug)]
pub struct ConfigResolver {
    products_dir: PathBuf,
    cache: RwLock<HashMap<(String, String), Arc<ResolvedConfig>>>,
}

impl ConfigResolver {
    /// Creates a resolver rooted at the given products directory.
    #[must_use]
    pub fn new(products_dir: impl Into<PathBuf>) -> Self {
        Self {
            products_dir: products_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves the configuration for one (product, language) pair.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the missing file, the YAML parse
    /// diagnostic, or the list of fields that failed validation.
    pub fn resolve(&self, product: &str, lang: &str) -> Result<Arc<ResolvedConfig>, ConfigError> {
        let key = (product.to_string(), lang.to_string());
        if let Some(found) = self.cache.read().get(&key) {
            return Ok(Arc::clone(found));
        }

        let resolved = Arc::new(self.load(product, lang)?);
        self.cache
            .write()
            .entry(key)
            .or_insert_with(|| Arc::clone(&resolved));
        Ok(resolved)
    }

    fn load(&self, product: &str, lang: &str) -> Result<ResolvedConfig, ConfigError> {
        let product_path = self.products_dir.join(product).join("product.yaml");
        let variant_path = self.products_dir.join(product).join(format!("{lang}.yaml"));

        let descriptor: ProductDescriptor = read_yaml(&product_path)?;
        let variant: VariantDescriptor = read_yaml(&variant_path)?;

        let product_id = descriptor.id.clone().unwrap_or_else(|| product.to_string());
        validate_product(&product_path, &product_id, &descriptor)?;
        validate_variant(&variant_path, &variant)?;

        let company = descriptor.company.as_deref().unwrap_or(&descriptor.name);
        let company_short = company.chars().take(2).collect::<String>().to_uppercase();

        let collection = variant
            .collection
            .clone()
            .unwrap_or_else(|| format!("{product_id}_{}", variant.lang));
        if !is_identifier(&collection) {
            return Err(ConfigError::Validation {
                path: variant_path.display().to_string(),
                fields: vec![format!("collection: not lowercase [a-z0-9_]: {collection}")],
            });
        }

        Ok(ResolvedConfig {
            product_id,
            name: descriptor.name,
            company_short,
            chunker: descriptor.chunker,
            doc_subdirs: descriptor.doc_subdirs,
            search: descriptor.search,
            instructions: descriptor.instructions,
            min_chunk_size: descriptor.min_chunk_size,
            lang: variant.lang,
            doc_language: variant.doc_language,
            collection,
            raw_data: variant.raw_data,
            description: variant.description,
            resources: variant.resources,
        })
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.display().to_string(),
    })?;
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn validate_product(
    path: &Path,
    product_id: &str,
    descriptor: &ProductDescriptor,
) -> Result<(), ConfigError> {
    let mut fields = Vec::new();
    if !is_identifier(product_id) {
        fields.push(format!("id: not lowercase [a-z0-9_]: {product_id}"));
    }
    if descriptor.name.trim().is_empty() {
        fields.push("name: must not be empty".to_string());
    }
    if descriptor.doc_subdirs.is_empty() {
        fields.push("doc_subdirs: must list at least one directory".to_string());
    }
    if descriptor.search.prefetch_limit == 0 {
        fields.push("search.prefetch_limit: must be > 0".to_string());
    }
    if descriptor.search.rerank_top_k == 0 {
        fields.push("search.rerank_top_k: must be > 0".to_string());
    }
    if descriptor.search.default_limit == 0 {
        fields.push("search.default_limit: must be > 0".to_string());
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            path: path.display().to_string(),
            fields,
        })
    }
}

fn validate_variant(path: &Path, variant: &VariantDescriptor) -> Result<(), ConfigError> {
    let mut fields = Vec::new();
    if !is_identifier(&variant.lang) {
        fields.push(format!("lang: not lowercase [a-z0-9_]: {}", variant.lang));
    }
    if variant.doc_language.trim().is_empty() {
        fields.push("doc_language: must not be empty".to_string());
    }
    if variant.raw_data.trim().is_empty() {
        fields.push("raw_data: must not be empty".to_string());
    }
    for (key, resource) in &variant.resources {
        if resource.mime_type.trim().is_empty() {
            fields.push(format!("resources.{key}.mime_type: must not be empty"));
        }
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            path: path.display().to_string(),
            fields,
        })
    }
}
