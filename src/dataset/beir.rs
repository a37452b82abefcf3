//! Local BEIR-layout dataset reader.
//!
//! Expects `corpus.jsonl`, `queries.jsonl` and `qrels/<split>.tsv` in one
//! directory. Downloading and unpacking the archive is left to the user.

use crate::dataset::{Corpus, CorpusDocument, DatasetProvider, Query, RelevanceJudgments};
use crate::error::{RerankError, Result};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Ids appear as strings in most BEIR sets and as integers in a few.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
struct CorpusLine {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct QueryLine {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    id: String,
    text: String,
}

/// BEIR dataset stored on local disk
pub struct BeirDataset {
    root: PathBuf,
    split: String,
}

impl BeirDataset {
    /// Use `root` directly as the dataset directory.
    pub fn new<P: AsRef<Path>>(root: P, split: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            split: split.into(),
        }
    }

    /// Find the dataset under `dir`, `dir/<name>` or `dir/<name>/<name>`
    /// (name lowercased), whichever first contains `corpus.jsonl`.
    pub fn locate<P: AsRef<Path>>(dir: P, name: &str, split: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref();
        let name = name.to_lowercase();
        let candidates = [dir.to_path_buf(), dir.join(&name), dir.join(&name).join(&name)];
        let root = candidates
            .iter()
            .find(|c| c.join("corpus.jsonl").is_file())
            .ok_or_else(|| {
                RerankError::Dataset(format!(
                    "corpus.jsonl not found under {} (looked in {}, {}/{name}, {}/{name}/{name})",
                    dir.display(),
                    dir.display(),
                    dir.display(),
                    dir.display(),
                ))
            })?;
        log::info!("Using BEIR dataset dir: {}", root.display());
        Ok(Self::new(root, split))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self, relative: &str) -> Result<BufReader<File>> {
        let path = self.root.join(relative);
        let file = File::open(&path).map_err(|e| {
            RerankError::Dataset(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(BufReader::new(file))
    }
}

fn non_blank_lines(reader: impl BufRead) -> impl Iterator<Item = std::io::Result<String>> {
    reader
        .lines()
        .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
}

impl DatasetProvider for BeirDataset {
    fn load_corpus(&self) -> Result<Corpus> {
        let mut corpus = Corpus::new();
        for line in non_blank_lines(self.open("corpus.jsonl")?) {
            let parsed: CorpusLine = serde_json::from_str(&line?)?;
            corpus.insert(
                parsed.id,
                CorpusDocument {
                    title: parsed.title.unwrap_or_default(),
                    text: parsed.text.unwrap_or_default(),
                },
            );
        }
        log::info!("Loaded {} corpus documents", corpus.len());
        Ok(corpus)
    }

    fn load_queries(&self) -> Result<Vec<Query>> {
        let mut queries = Vec::new();
        for line in non_blank_lines(self.open("queries.jsonl")?) {
            let parsed: QueryLine = serde_json::from_str(&line?)?;
            queries.push(Query {
                id: parsed.id,
                text: parsed.text,
            });
        }
        Ok(queries)
    }

    fn load_judgments(&self) -> Result<RelevanceJudgments> {
        let relative = format!("qrels/{}.tsv", self.split);
        let mut judgments = RelevanceJudgments::new();
        for (line_no, line) in non_blank_lines(self.open(&relative)?).enumerate() {
            let line = line?;
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields.len() < 3 {
                return Err(RerankError::Dataset(format!(
                    "{}:{}: expected 3 tab-separated fields",
                    relative,
                    line_no + 1
                )));
            }
            let grade = match fields[2].parse::<i32>() {
                Ok(g) => g,
                // header row
                Err(_) if line_no == 0 => continue,
                Err(_) => {
                    return Err(RerankError::Dataset(format!(
                        "{}:{}: invalid relevance grade {:?}",
                        relative,
                        line_no + 1,
                        fields[2]
                    )))
                }
            };
            judgments
                .entry(fields[0].to_string())
                .or_default()
                .insert(fields[1].to_string(), grade);
        }
        Ok(judgments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_dataset(root: &Path) {
        fs::create_dir_all(root.join("qrels")).unwrap();
        fs::write(
            root.join("corpus.jsonl"),
            concat!(
                r#"{"_id": "d1", "title": "Vitamin D", "text": "reduces infection risk", "metadata": {}}"#,
                "\n",
                r#"{"_id": 42, "text": "no title here"}"#,
                "\n\n",
            ),
        )
        .unwrap();
        fs::write(
            root.join("queries.jsonl"),
            concat!(
                r#"{"_id": "q1", "text": "does vitamin d help", "metadata": {}}"#,
                "\n",
                r#"{"_id": "q2", "text": "unjudged query"}"#,
                "\n",
            ),
        )
        .unwrap();
        fs::write(
            root.join("qrels/test.tsv"),
            "query-id\tcorpus-id\tscore\nq1\td1\t1\nq1\t42\t0\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_all_parts() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path());
        let dataset = BeirDataset::new(temp_dir.path(), "test");

        let corpus = dataset.load_corpus().unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus["d1"].title, "Vitamin D");
        assert_eq!(corpus["42"].title, "");
        assert_eq!(corpus["42"].text, "no title here");

        let queries = dataset.load_queries().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].id, "q1");

        let judgments = dataset.load_judgments().unwrap();
        assert_eq!(judgments["q1"]["d1"], 1);
        assert_eq!(judgments["q1"]["42"], 0);
    }

    #[test]
    fn test_load_keeps_only_judged_queries() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path());
        let dataset = BeirDataset::new(temp_dir.path(), "test");
        let (_, queries, _) = dataset.load().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].id, "q1");
    }

    #[test]
    fn test_locate_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("scifact").join("scifact");
        write_dataset(&nested);
        let dataset = BeirDataset::locate(temp_dir.path(), "SciFact", "test").unwrap();
        assert_eq!(dataset.root(), nested.as_path());
    }

    #[test]
    fn test_locate_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = BeirDataset::locate(temp_dir.path(), "scifact", "test").err().unwrap();
        assert!(matches!(err, RerankError::Dataset(_)));
    }

    #[test]
    fn test_bad_grade_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path());
        fs::write(
            temp_dir.path().join("qrels/test.tsv"),
            "query-id\tcorpus-id\tscore\nq1\td1\thigh\n",
        )
        .unwrap();
        let dataset = BeirDataset::new(temp_dir.path(), "test");
        assert!(matches!(dataset.load_judgments(), Err(RerankError::Dataset(_))));
    }

    #[test]
    fn test_missing_split_file() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path());
        let dataset = BeirDataset::new(temp_dir.path(), "dev");
        assert!(matches!(dataset.load_judgments(), Err(RerankError::Dataset(_))));
    }
}
