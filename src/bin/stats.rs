use rerankeval::search::SqliteVectorStore;
use rerankeval::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let store = SqliteVectorStore::open(config.db_path()).await?;

    let count = store.count().await?;
    let dimension = store.dimension().await?;

    println!("\n=== Collection Statistics ===\n");
    println!("{:-<50}", "");
    println!("{:<20} {}", "Database", config.db_path().display());
    println!("{:<20} {}", "Documents", count);
    match dimension {
        Some(dim) => println!("{:<20} {}", "Dimension", dim),
        None => println!("{:<20} {}", "Dimension", "unset"),
    }
    println!("{:-<50}", "");

    if count == 0 {
        println!("\nCollection is empty. Run `ingest` to index the corpus.");
    }
    println!();

    Ok(())
}
