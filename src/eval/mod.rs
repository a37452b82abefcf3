//! Evaluation: rank metrics and the recall → rerank harness.

pub mod harness;
pub mod metrics;

pub use harness::{
    covered_queries, percentile, EvalOutcome, EvalSummary, EvaluationHarness, HarnessSettings,
    LatencySummary, MetricSample,
};
pub use metrics::{binary_relevance, dcg, mrr_at_10, ndcg_at_10, precision_at_k, RankMetrics};
