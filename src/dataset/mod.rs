//! Corpus, query and relevance-judgment sources.

pub mod beir;

pub use beir::BeirDataset;

use crate::error::Result;
use std::collections::HashMap;

/// A corpus entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorpusDocument {
    pub title: String,
    pub text: String,
}

/// Document id -> document
pub type Corpus = HashMap<String, CorpusDocument>;

/// An evaluation query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: String,
    pub text: String,
}

/// Query id -> (document id -> graded relevance). Grade > 0 means relevant.
pub type RelevanceJudgments = HashMap<String, HashMap<String, i32>>;

/// Source of an evaluation dataset.
pub trait DatasetProvider {
    fn load_corpus(&self) -> Result<Corpus>;

    /// Queries in file order.
    fn load_queries(&self) -> Result<Vec<Query>>;

    fn load_judgments(&self) -> Result<RelevanceJudgments>;

    /// Corpus, judgments, and the queries that have judgments.
    fn load(&self) -> Result<(Corpus, Vec<Query>, RelevanceJudgments)> {
        let corpus = self.load_corpus()?;
        let judgments = self.load_judgments()?;
        let queries = self
            .load_queries()?
            .into_iter()
            .filter(|q| judgments.contains_key(&q.id))
            .collect();
        Ok((corpus, queries, judgments))
    }
}
