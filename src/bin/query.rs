use clap::Parser;
use rerankeval::embeddings::build_embedder;
use rerankeval::rerank::{build_reranker, RerankerKind};
use rerankeval::search::{self, Candidate, SqliteVectorStore};
use rerankeval::Config;
use std::collections::HashMap;
use std::time::Instant;

/// Run one query through recall and rerank and print both rankings.
#[derive(Parser, Debug)]
#[command(name = "query")]
struct Args {
    /// Query text
    #[arg(long)]
    q: String,

    /// Recall candidates (default: recall.top_k)
    #[arg(long)]
    k: Option<usize>,

    /// Results printed per list (default: recall.show)
    #[arg(long)]
    show: Option<usize>,

    #[arg(long, value_enum, default_value_t = RerankerKind::Sparse)]
    reranker: RerankerKind,
}

fn snippet(text: &str) -> String {
    text.chars().take(180).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    if args.q.trim().is_empty() {
        anyhow::bail!("Query cannot be empty");
    }

    let config = Config::load()?;
    let k = args.k.unwrap_or(config.recall.top_k);
    let show = args.show.unwrap_or(config.recall.show);

    let store = SqliteVectorStore::open(config.db_path()).await?;
    let embedder = build_embedder(&config.embeddings)?;
    let mut reranker = build_reranker(args.reranker, &config.rerank);

    let start = Instant::now();
    let candidates = search::recall(embedder.as_ref(), &store, &args.q, k).await?;
    let recalled = Instant::now();

    let post: Vec<Candidate> = match reranker.as_mut() {
        Some(reranker) => {
            let depth = config.rerank_depth().min(candidates.len());
            reranker
                .rerank(&args.q, candidates[..depth].to_vec())
                .await?
        }
        None => candidates.clone(),
    };
    let done = Instant::now();

    println!("\n=== Before (dense-only) ===");
    for (i, c) in candidates.iter().take(show).enumerate() {
        println!("{:2}. ({:.3}) {}...", i + 1, c.score, snippet(&c.text));
    }

    println!("\n=== After (reranked: {}) ===", args.reranker);
    let pre_rank: HashMap<&str, usize> = candidates
        .iter()
        .take(show)
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i + 1))
        .collect();
    for (i, c) in post.iter().take(show).enumerate() {
        let tag = pre_rank
            .get(c.id.as_str())
            .map(|was| format!(" (was #{})", was))
            .unwrap_or_default();
        let score = c.rerank_score.unwrap_or(0.0);
        println!("{:2}. ({:.3}){} {}...", i + 1, score, tag, snippet(&c.text));
    }

    let ms = |d: std::time::Duration| d.as_secs_f64() * 1000.0;
    println!(
        "\nLatency: recall {:.1} ms | rerank {:.1} ms | total {:.1} ms",
        ms(recalled - start),
        ms(done - recalled),
        ms(done - start)
    );

    Ok(())
}
