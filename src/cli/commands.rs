//! Command execution.
//!
//! Wires settings, resolved product configurations, and the shared
//! upstream clients into the offline indexing pipeline or the online
//! service.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunking::create_chunker;
use crate::cli::parser::{Cli, Commands};
use crate::config::{ConfigResolver, Settings};
use crate::core::Chunk;
use crate::embedding::VoyageClient;
use crate::error::{IngestionError, Result};
use crate::ingest::{CheckpointStore, Indexer};
use crate::limiter::RateLimiter;
use crate::loader::DocumentLoader;
use crate::mcp::{AppState, ProductState};
use crate::search::Searcher;
use crate::store::QdrantClient;

/// Shared upstream clients, constructed once per process.
struct Upstream {
    embedder: Arc<VoyageClient>,
    store: Arc<QdrantClient>,
}

fn upstream(settings: &Settings) -> Upstream {
    let limiter = Arc::new(RateLimiter::new(settings.rpm_limit, settings.tpm_limit));
    Upstream {
        embedder: Arc::new(VoyageClient::new(
            settings.voyage_api_key.clone(),
            settings.embed_model.clone(),
            settings.rerank_model.clone(),
            settings.batch_size,
            limiter,
        )),
        store: Arc::new(QdrantClient::new(
            settings.qdrant_url.clone(),
            settings.qdrant_api_key.clone(),
        )),
    }
}

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Propagates configuration, ingestion, and server failures; the binary
/// maps them to a non-zero exit code.
pub async fn execute(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Index {
            product,
            lang,
            force,
        } => run_index(&settings, product, lang, force).await,
        Commands::Serve => run_serve(&settings).await,
    }
}

async fn run_index(
    settings: &Settings,
    product: Option<String>,
    lang: Option<String>,
    force: bool,
) -> Result<()> {
    let products = product.map_or_else(|| settings.products.clone(), |p| vec![p]);
    let lang = lang.unwrap_or_else(|| settings.doc_lang.clone());
    let resolver = ConfigResolver::new(settings.products_dir.clone());
    let upstream = upstream(settings);

    for product_id in &products {
        let config = resolver.resolve(product_id, &lang)?;
        let base_dir = settings.raw_data_dir.join(&config.raw_data);
        let loader = DocumentLoader::new(&base_dir, config.doc_subdirs.clone());
        let documents = loader.load()?;
        if documents.is_empty() {
            return Err(IngestionError::EmptyCorpus {
                base_dir: base_dir.display().to_string(),
            }
            .into());
        }

        let chunker = create_chunker(config.chunker, settings.chunk_size, config.min_chunk_size)?;
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| chunker.chunk(d)).collect();
        tracing::info!(
            product_id,
            documents = documents.len(),
            chunks = chunks.len(),
            strategy = chunker.name(),
            "corpus chunked"
        );

        let indexer = Indexer::new(
            Arc::clone(&upstream.embedder),
            Arc::clone(&upstream.store),
            CheckpointStore::new(&settings.checkpoints_dir, product_id),
            config.collection.clone(),
            settings.batch_size,
        );
        indexer.init_collection(force).await?;
        let report = indexer.run(&chunks).await?;
        tracing::info!(
            product_id,
            collection = %config.collection,
            total = report.total,
            succeeded = report.succeeded,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "index run finished"
        );
    }
    Ok(())
}

async fn run_serve(settings: &Settings) -> Result<()> {
    let resolver = ConfigResolver::new(settings.products_dir.clone());
    let upstream = upstream(settings);

    let mut products = HashMap::new();
    for product_id in &settings.products {
        let config = resolver.resolve(product_id, &settings.doc_lang)?;
        let searcher = Arc::new(Searcher::new(
            Arc::clone(&config),
            Arc::clone(&upstream.embedder),
            Arc::clone(&upstream.store),
        ));
        tracing::info!(
            product_id,
            collection = %config.collection,
            "product registered"
        );
        products.insert(
            config.product_id.clone(),
            Arc::new(ProductState::new(config, searcher)),
        );
    }

    let state = Arc::new(AppState::new(products));
    crate::mcp::serve(state, &settings.host, settings.port)
        .await
        .map_err(|e| crate::error::Error::Io(e.to_string()))
}
