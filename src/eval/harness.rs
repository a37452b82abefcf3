//! Recall → rerank → metrics loop over a query set, with per-stage latency.

use crate::config::Config;
use crate::dataset::{Query, RelevanceJudgments};
use crate::embeddings::Embedder;
use crate::error::{RerankError, Result};
use crate::eval::metrics::{binary_relevance, RankMetrics};
use crate::rerank::Reranker;
use crate::search::{self, VectorStore};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Knobs for one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessSettings {
    /// Candidates fetched from the vector store
    pub recall_k: usize,
    /// Prefix of the recall list handed to the reranker
    pub rerank_depth: usize,
    /// Both lists are cut to this length before scoring
    pub show_k: usize,
    /// Evaluate at most this many queries
    pub limit: Option<usize>,
    /// Only queries with a judged-relevant document present in the store
    pub covered_only: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            recall_k: 100,
            rerank_depth: 100,
            show_k: 10,
            limit: None,
            covered_only: false,
        }
    }
}

impl HarnessSettings {
    /// Settings from configuration; `eval.limit = 0` means no limit.
    pub fn from_config(config: &Config) -> Self {
        Self {
            recall_k: config.recall.top_k,
            rerank_depth: config.rerank_depth(),
            show_k: config.recall.show,
            limit: (config.eval.limit > 0).then_some(config.eval.limit),
            covered_only: config.eval.covered_only,
        }
    }
}

/// Per-query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub query_id: String,
    pub pre: RankMetrics,
    pub post: RankMetrics,
    pub recall_ms: f64,
    pub rerank_ms: f64,
}

/// Latency distribution in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencySummary {
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

impl LatencySummary {
    fn from_samples(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: mean(values)?,
            p50: percentile(values, 50.0)?,
            p95: percentile(values, 95.0)?,
        })
    }
}

/// Aggregate over all evaluated queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSummary {
    pub reranker: String,
    pub queries_evaluated: usize,
    pub queries_skipped: usize,
    pub queries_failed: usize,
    pub pre: RankMetrics,
    pub post: RankMetrics,
    pub recall_latency: LatencySummary,
    pub rerank_latency: LatencySummary,
    pub total_latency: LatencySummary,
}

/// Result of [`EvaluationHarness::run`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvalOutcome {
    /// No query produced a sample; no means were computed
    NothingEvaluated { skipped: usize, failed: usize },
    Completed(EvalSummary),
}

/// Arithmetic mean; None for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Percentile `p` in [0, 100] with linear interpolation between closest ranks.
/// None for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn mean_metrics(samples: &[RankMetrics]) -> Option<RankMetrics> {
    let collect = |f: fn(&RankMetrics) -> f64| samples.iter().map(f).collect::<Vec<_>>();
    Some(RankMetrics {
        ndcg_at_10: mean(&collect(|m| m.ndcg_at_10))?,
        mrr_at_10: mean(&collect(|m| m.mrr_at_10))?,
        precision_at_10: mean(&collect(|m| m.precision_at_10))?,
    })
}

/// Queries with at least one relevant (grade > 0) document present in `indexed`.
pub fn covered_queries(
    queries: &[Query],
    judgments: &RelevanceJudgments,
    indexed: &HashSet<String>,
) -> Vec<Query> {
    queries
        .iter()
        .filter(|q| {
            judgments.get(&q.id).is_some_and(|grades| {
                grades
                    .iter()
                    .any(|(doc_id, &grade)| grade > 0 && indexed.contains(doc_id))
            })
        })
        .cloned()
        .collect()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Drives recall, rerank and scoring over a query set.
///
/// Queries run one after another. A query without judgments is skipped; a query
/// whose recall or rerank fails is logged and left out of the aggregate. A
/// malformed sparse vector aborts the run since it means the encoder broke its
/// contract.
pub struct EvaluationHarness<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    settings: HarnessSettings,
}

impl<'a> EvaluationHarness<'a> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a dyn VectorStore, settings: HarnessSettings) -> Self {
        Self {
            embedder,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Apply the coverage filter (if enabled) and then the limit.
    pub async fn select_queries(
        &self,
        queries: &[Query],
        judgments: &RelevanceJudgments,
    ) -> Result<Vec<Query>> {
        let mut selected = if self.settings.covered_only {
            let indexed = self.store.list_document_ids().await?;
            let covered = covered_queries(queries, judgments, &indexed);
            log::info!(
                "Covered-only: {} of {} queries have a relevant document indexed",
                covered.len(),
                queries.len()
            );
            covered
        } else {
            queries.to_vec()
        };
        if let Some(limit) = self.settings.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    /// Recall, rerank and score a single query.
    pub async fn evaluate_query(
        &self,
        reranker: &mut dyn Reranker,
        query: &Query,
        grades: Option<&HashMap<String, i32>>,
    ) -> Result<MetricSample> {
        let grades = grades.ok_or_else(|| {
            RerankError::DataUnavailable(format!("no judgments for query {}", query.id))
        })?;

        let start = Instant::now();
        let candidates =
            search::recall(self.embedder, self.store, &query.text, self.settings.recall_k).await?;
        let recall_ms = elapsed_ms(start);

        let start = Instant::now();
        let depth = self.settings.rerank_depth.min(candidates.len());
        let reranked = reranker
            .rerank(&query.text, candidates[..depth].to_vec())
            .await?;
        let rerank_ms = elapsed_ms(start);

        let show = self.settings.show_k;
        let pre = &candidates[..show.min(candidates.len())];
        let post = &reranked[..show.min(reranked.len())];

        Ok(MetricSample {
            query_id: query.id.clone(),
            pre: RankMetrics::from_binary(&binary_relevance(pre, Some(grades))),
            post: RankMetrics::from_binary(&binary_relevance(post, Some(grades))),
            recall_ms,
            rerank_ms,
        })
    }

    /// Evaluate every selected query and aggregate.
    pub async fn run(
        &self,
        reranker: &mut dyn Reranker,
        queries: &[Query],
        judgments: &RelevanceJudgments,
    ) -> Result<EvalOutcome> {
        let selected = self.select_queries(queries, judgments).await?;
        log::info!(
            "Evaluating {} queries with reranker {}",
            selected.len(),
            reranker.name()
        );

        let mut samples: Vec<MetricSample> = Vec::with_capacity(selected.len());
        let mut skipped = 0;
        let mut failed = 0;

        for query in &selected {
            match self
                .evaluate_query(reranker, query, judgments.get(&query.id))
                .await
            {
                Ok(sample) => samples.push(sample),
                Err(RerankError::DataUnavailable(msg)) => {
                    log::debug!("Skipping query: {}", msg);
                    skipped += 1;
                }
                Err(e @ RerankError::MalformedSparseVector(_)) => return Err(e),
                Err(e) => {
                    log::warn!("Query {} failed: {}", query.id, e);
                    failed += 1;
                }
            }
        }

        Ok(self.summarize(reranker.name(), &samples, skipped, failed))
    }

    fn summarize(
        &self,
        reranker: &str,
        samples: &[MetricSample],
        skipped: usize,
        failed: usize,
    ) -> EvalOutcome {
        let pre: Vec<RankMetrics> = samples.iter().map(|s| s.pre).collect();
        let post: Vec<RankMetrics> = samples.iter().map(|s| s.post).collect();
        let recall: Vec<f64> = samples.iter().map(|s| s.recall_ms).collect();
        let rerank: Vec<f64> = samples.iter().map(|s| s.rerank_ms).collect();
        let total: Vec<f64> = samples.iter().map(|s| s.recall_ms + s.rerank_ms).collect();

        let summary = (|| {
            Some(EvalSummary {
                reranker: reranker.to_string(),
                queries_evaluated: samples.len(),
                queries_skipped: skipped,
                queries_failed: failed,
                pre: mean_metrics(&pre)?,
                post: mean_metrics(&post)?,
                recall_latency: LatencySummary::from_samples(&recall)?,
                rerank_latency: LatencySummary::from_samples(&rerank)?,
                total_latency: LatencySummary::from_samples(&total)?,
            })
        })();

        match summary {
            Some(summary) => EvalOutcome::Completed(summary),
            None => EvalOutcome::NothingEvaluated { skipped, failed },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{HashingEmbedder, HashingSparseEmbedder};
    use crate::rerank::SparseReranker;
    use crate::scoring::SparseVector;
    use crate::embeddings::SparseEmbedder;
    use crate::search::{Candidate, MemoryVectorStore, StoredDocument};
    use async_trait::async_trait;

    fn query(id: &str, text: &str) -> Query {
        Query {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn judgments(entries: &[(&str, &str, i32)]) -> RelevanceJudgments {
        let mut out = RelevanceJudgments::new();
        for (q, d, g) in entries {
            out.entry(q.to_string()).or_default().insert(d.to_string(), *g);
        }
        out
    }

    async fn store_with(embedder: &HashingEmbedder, docs: &[(&str, &str)]) -> MemoryVectorStore {
        let texts: Vec<String> = docs.iter().map(|(_, t)| t.to_string()).collect();
        let vectors = embedder.encode(&texts).await.unwrap();
        MemoryVectorStore::with_documents(
            docs.iter()
                .zip(vectors)
                .map(|((id, text), embedding)| StoredDocument {
                    id: id.to_string(),
                    text: text.to_string(),
                    embedding,
                })
                .collect(),
        )
    }

    fn corpus() -> Vec<(&'static str, &'static str)> {
        vec![
            ("d1", "vitamin d reduces respiratory infection risk"),
            ("d2", "gardening tips for spring tomatoes"),
            ("d3", "vitamin supplements and bone density"),
            ("d4", "infection control in hospitals"),
        ]
    }

    #[test]
    fn test_mean_and_percentile() {
        assert_eq!(mean(&[]), None);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 50.0), Some(2.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
        assert_eq!(percentile(&[5.0], 95.0), Some(5.0));
        let p95 = percentile(&[0.0, 10.0], 95.0).unwrap();
        assert!((p95 - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_covered_queries_requires_overlap() {
        let queries = vec![query("q1", "x")];
        let judged = judgments(&[("q1", "d1", 1)]);
        let indexed: HashSet<String> = ["d2".to_string()].into_iter().collect();
        assert!(covered_queries(&queries, &judged, &indexed).is_empty());

        let indexed: HashSet<String> = ["d1".to_string()].into_iter().collect();
        assert_eq!(covered_queries(&queries, &judged, &indexed).len(), 1);
    }

    #[test]
    fn test_covered_queries_ignores_zero_grades() {
        let queries = vec![query("q1", "x"), query("q2", "y")];
        let judged = judgments(&[("q1", "d1", 0), ("q2", "d1", 2)]);
        let indexed: HashSet<String> = ["d1".to_string()].into_iter().collect();
        let covered = covered_queries(&queries, &judged, &indexed);
        assert_eq!(covered, vec![query("q2", "y")]);
    }

    #[tokio::test]
    async fn test_empty_query_set_is_nothing_evaluated() {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let harness = EvaluationHarness::new(&embedder, &store, HarnessSettings::default());
        let mut reranker = SparseReranker::new(HashingSparseEmbedder::new(), 100);

        let outcome = harness
            .run(&mut reranker, &[], &RelevanceJudgments::new())
            .await
            .unwrap();
        assert_eq!(outcome, EvalOutcome::NothingEvaluated { skipped: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_covered_only_filters_everything() {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let settings = HarnessSettings {
            covered_only: true,
            ..HarnessSettings::default()
        };
        let harness = EvaluationHarness::new(&embedder, &store, settings);
        let mut reranker = SparseReranker::new(HashingSparseEmbedder::new(), 100);

        let outcome = harness
            .run(
                &mut reranker,
                &[query("q1", "vitamin d")],
                &judgments(&[("q1", "missing-doc", 1)]),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, EvalOutcome::NothingEvaluated { .. }));
    }

    #[tokio::test]
    async fn test_unjudged_queries_skipped() {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let harness = EvaluationHarness::new(&embedder, &store, HarnessSettings::default());
        let mut reranker = SparseReranker::new(HashingSparseEmbedder::new(), 100);

        let outcome = harness
            .run(
                &mut reranker,
                &[query("q1", "vitamin d infection"), query("q2", "tomatoes")],
                &judgments(&[("q1", "d1", 1)]),
            )
            .await
            .unwrap();
        match outcome {
            EvalOutcome::Completed(summary) => {
                assert_eq!(summary.queries_evaluated, 1);
                assert_eq!(summary.queries_skipped, 1);
                assert_eq!(summary.queries_failed, 0);
                assert_eq!(summary.reranker, "sparse");
            }
            other => panic!("expected completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_metrics() {
        let embedder = HashingEmbedder::new(128);
        let store = store_with(&embedder, &corpus()).await;
        let settings = HarnessSettings {
            recall_k: 4,
            rerank_depth: 4,
            show_k: 10,
            limit: Some(5),
            covered_only: true,
        };
        let harness = EvaluationHarness::new(&embedder, &store, settings);
        let mut reranker = SparseReranker::new(HashingSparseEmbedder::new(), 100);

        let outcome = harness
            .run(
                &mut reranker,
                &[query("q1", "does vitamin d reduce respiratory infection")],
                &judgments(&[("q1", "d1", 2), ("q1", "d2", 0)]),
            )
            .await
            .unwrap();

        let summary = match outcome {
            EvalOutcome::Completed(s) => s,
            other => panic!("expected completed run, got {:?}", other),
        };
        assert_eq!(summary.queries_evaluated, 1);
        // d1 shares the most terms, so the sparse reranker puts it first
        assert!((summary.post.ndcg_at_10 - 1.0).abs() < 1e-9);
        assert!((summary.post.mrr_at_10 - 1.0).abs() < 1e-9);
        assert!((summary.post.precision_at_10 - 0.25).abs() < 1e-9);
        // both lists hold the same four documents
        assert!((summary.pre.precision_at_10 - 0.25).abs() < 1e-9);
        assert!(summary.recall_latency.p50 >= 0.0);
        assert!(summary.total_latency.mean >= summary.rerank_latency.mean);
    }

    #[tokio::test]
    async fn test_limit_and_depth() {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let settings = HarnessSettings {
            recall_k: 4,
            rerank_depth: 2,
            show_k: 3,
            limit: Some(1),
            covered_only: false,
        };
        let harness = EvaluationHarness::new(&embedder, &store, settings);
        let selected = harness
            .select_queries(
                &[query("q1", "a"), query("q2", "b")],
                &judgments(&[("q1", "d1", 1), ("q2", "d1", 1)]),
            )
            .await
            .unwrap();
        assert_eq!(selected, vec![query("q1", "a")]);

        let mut reranker = SparseReranker::new(HashingSparseEmbedder::new(), 100);
        let grades = judgments(&[("q1", "d1", 1)]);
        let sample = harness
            .evaluate_query(&mut reranker, &query("q1", "vitamin"), grades.get("q1"))
            .await
            .unwrap();
        // post list only holds the reranked prefix
        assert!(sample.post.precision_at_10 <= 1.0);
        assert!(sample.recall_ms >= 0.0 && sample.rerank_ms >= 0.0);
    }

    /// Sparse encoder that breaks the sorted-index contract, for documents only
    /// or for every text
    struct BrokenEmbedder {
        query_ok: bool,
    }

    #[async_trait]
    impl SparseEmbedder for BrokenEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<SparseVector>> {
            texts
                .iter()
                .map(|t| {
                    if self.query_ok && t == "vitamin" {
                        Ok(SparseVector::from_pairs(vec![(1, 1.0)]))
                    } else {
                        SparseVector::new(vec![5, 1], vec![1.0, 1.0])
                    }
                })
                .collect()
        }
    }

    /// Reranker that always fails with an encoding error
    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        fn name(&self) -> &str {
            "failing"
        }

        async fn rerank(&mut self, _query: &str, _candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
            Err(RerankError::Embedding("model unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_queries_counted_not_fatal() {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let harness = EvaluationHarness::new(&embedder, &store, HarnessSettings::default());

        let outcome = harness
            .run(
                &mut FailingReranker,
                &[query("q1", "vitamin")],
                &judgments(&[("q1", "d1", 1)]),
            )
            .await
            .unwrap();
        assert_eq!(outcome, EvalOutcome::NothingEvaluated { skipped: 0, failed: 1 });
    }

    async fn run_with_broken_encoder(query_ok: bool) -> Result<EvalOutcome> {
        let embedder = HashingEmbedder::new(64);
        let store = store_with(&embedder, &corpus()).await;
        let harness = EvaluationHarness::new(&embedder, &store, HarnessSettings::default());
        let mut reranker = SparseReranker::new(BrokenEmbedder { query_ok }, 10);
        harness
            .run(
                &mut reranker,
                &[query("q1", "vitamin")],
                &judgments(&[("q1", "d1", 1)]),
            )
            .await
    }

    #[tokio::test]
    async fn test_malformed_query_vector_aborts_run() {
        let result = run_with_broken_encoder(false).await;
        assert!(matches!(result, Err(RerankError::MalformedSparseVector(_))));
    }

    #[tokio::test]
    async fn test_malformed_document_vector_aborts_run() {
        let result = run_with_broken_encoder(true).await;
        assert!(matches!(result, Err(RerankError::MalformedSparseVector(_))));
    }
}
