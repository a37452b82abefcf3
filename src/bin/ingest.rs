use anyhow::Result;
use clap::Parser;
use rerankeval::dataset::{BeirDataset, DatasetProvider};
use rerankeval::embeddings::build_embedder;
use rerankeval::ingest::{index_corpus, IndexOptions};
use rerankeval::search::SqliteVectorStore;
use rerankeval::Config;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Embed the BEIR corpus and write it to the vector store")]
struct Args {
    /// Drop every stored document before indexing
    #[arg(short, long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    let dataset = BeirDataset::locate(
        &config.dataset.dir,
        &config.dataset.name,
        config.dataset.split.clone(),
    )?;
    let corpus = dataset.load_corpus()?;
    if corpus.is_empty() {
        log::warn!("Corpus is empty. Check dataset.dir in config.toml.");
        return Ok(());
    }

    let store = SqliteVectorStore::open(config.db_path()).await?;
    if args.reset {
        store.reset().await?;
    }

    let embedder = build_embedder(&config.embeddings)?;
    log::info!(
        "Embedding provider: {} (dimension {})",
        config.embeddings.provider,
        embedder.dimension()
    );

    let start = Instant::now();
    let written = index_corpus(
        &store,
        embedder.as_ref(),
        &corpus,
        IndexOptions::from_config(&config.embeddings),
    )
    .await?;

    log::info!("=== Ingestion Complete ===");
    log::info!("Documents written: {}", written);
    log::info!("Documents in store: {}", store.count().await?);
    log::info!("Time: {:?}", start.elapsed());

    Ok(())
}
