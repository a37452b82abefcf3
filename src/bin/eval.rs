//! Evaluation CLI: dense recall, rerank, and nDCG@10 / MRR@10 / P@10 before and after.

use clap::Parser;
use rerankeval::dataset::{BeirDataset, DatasetProvider};
use rerankeval::embeddings::build_embedder;
use rerankeval::eval::{EvalOutcome, EvalSummary, EvaluationHarness, HarnessSettings, RankMetrics};
use rerankeval::rerank::{build_reranker, RerankerKind};
use rerankeval::search::SqliteVectorStore;
use rerankeval::Config;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Evaluate dense recall against dense recall + rerank on a BEIR split")]
struct Args {
    /// Evaluate at most this many queries (default: eval.limit, 0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Recall candidates per query (default: recall.top_k)
    #[arg(long)]
    k: Option<usize>,

    #[arg(long, value_enum, default_value_t = RerankerKind::Sparse)]
    reranker: RerankerKind,

    /// Only queries with a relevant document present in the store
    #[arg(long)]
    covered_only: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn print_metrics(label: &str, m: &RankMetrics) {
    println!(
        "{:<14} nDCG@10: {:.4} | MRR@10: {:.4} | P@10: {:.4}",
        label, m.ndcg_at_10, m.mrr_at_10, m.precision_at_10
    );
}

fn print_summary(summary: &EvalSummary) {
    println!("\n=== Evaluation Results ({}) ===", summary.reranker);
    println!(
        "Queries: {} evaluated, {} skipped, {} failed\n",
        summary.queries_evaluated, summary.queries_skipped, summary.queries_failed
    );
    print_metrics("Dense", &summary.pre);
    print_metrics("Dense+rerank", &summary.post);
    println!(
        "\nLatency p50: recall {:.1} ms | rerank {:.1} ms | total {:.1} ms",
        summary.recall_latency.p50, summary.rerank_latency.p50, summary.total_latency.p50
    );
    println!(
        "Latency p95: recall {:.1} ms | rerank {:.1} ms | total {:.1} ms",
        summary.recall_latency.p95, summary.rerank_latency.p95, summary.total_latency.p95
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let mut settings = HarnessSettings::from_config(&config);
    if let Some(limit) = args.limit {
        settings.limit = (limit > 0).then_some(limit);
    }
    if let Some(k) = args.k {
        if k == 0 {
            anyhow::bail!("--k must be greater than 0");
        }
        settings.recall_k = k;
        settings.rerank_depth = config.recall.rerank_depth.unwrap_or(k).min(k);
    }
    settings.covered_only |= args.covered_only;

    let mut reranker = build_reranker(args.reranker, &config.rerank)
        .ok_or_else(|| anyhow::anyhow!("eval needs a reranker: sparse or late-interaction"))?;

    let dataset = BeirDataset::locate(
        &config.dataset.dir,
        &config.dataset.name,
        config.dataset.split.clone(),
    )?;
    let judgments = dataset.load_judgments()?;
    let mut queries = dataset.load_queries()?;
    queries.retain(|q| judgments.contains_key(&q.id));
    log::info!("{} judged queries in split {}", queries.len(), config.dataset.split);

    let store = SqliteVectorStore::open(config.db_path()).await?;
    let embedder = build_embedder(&config.embeddings)?;

    let harness = EvaluationHarness::new(embedder.as_ref(), &store, settings);
    let outcome = harness.run(reranker.as_mut(), &queries, &judgments).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        EvalOutcome::NothingEvaluated { skipped, failed } => {
            println!("No queries to evaluate ({} skipped, {} failed).", skipped, failed);
        }
        EvalOutcome::Completed(summary) => print_summary(summary),
    }

    Ok(())
}
