use crate::error::{LexicalIndexError, Result};
use crate::tokenizer::{TokenizerOptions, tokenize};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

/// Okapi BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f64,

    /// Length normalization strength, 0..=1
    #[serde(default = "default_b")]
    pub b: f64,

    /// Added inside the idf logarithm
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_k1() -> f64 {
    1.2
}

fn default_b() -> f64 {
    0.75
}

fn default_epsilon() -> f64 {
    0.25
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            epsilon: default_epsilon(),
        }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(format!("k1 must be a non-negative number, got {}", self.k1));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(format!("b must be between 0 and 1, got {}", self.b));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            ));
        }
        Ok(())
    }
}

/// What `add_document` does with an id that is already indexed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first version; later adds are silent no-ops
    #[default]
    InsertOnly,
    /// Replace the stored document in place
    Upsert,
}

/// A document handed to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl LexicalDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: Value) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Posting {
    doc: usize,
    frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    metadata: Value,
    term_frequencies: BTreeMap<String, u32>,
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub total_postings: usize,
    pub average_document_length: f64,
    pub params: Bm25Params,
    pub tokenizer: TokenizerOptions,
    pub policy: DuplicatePolicy,
}

/// Inverted index with Okapi BM25 ranking.
///
/// Not safe for concurrent mutation; one owner builds it, then it is
/// saved and searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalIndex {
    version: u32,
    params: Bm25Params,
    tokenizer: TokenizerOptions,
    #[serde(default)]
    policy: DuplicatePolicy,
    documents: Vec<StoredDocument>,
    document_lengths: Vec<usize>,
    total_length: usize,
    inverted_index: BTreeMap<String, Vec<Posting>>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            params: Bm25Params::default(),
            tokenizer: TokenizerOptions::default(),
            policy: DuplicatePolicy::default(),
            documents: Vec::new(),
            document_lengths: Vec::new(),
            total_length: 0,
            inverted_index: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }
}

impl LexicalIndex {
    pub fn new(params: Bm25Params, tokenizer: TokenizerOptions) -> Result<Self> {
        params.validate().map_err(LexicalIndexError::InvalidConfig)?;
        Ok(Self {
            params,
            tokenizer,
            ..Default::default()
        })
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Running mean of document lengths (0 when empty)
    pub fn average_document_length(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.documents.len() as f64
        }
    }

    /// Number of documents containing an already-normalized term
    pub fn term_document_frequency(&self, term: &str) -> usize {
        self.inverted_index.get(term).map_or(0, Vec::len)
    }

    /// Index one document. Returns `false` when a repeated id was ignored
    /// under [`DuplicatePolicy::InsertOnly`].
    pub fn add_document(&mut self, document: LexicalDocument) -> bool {
        let tokens = tokenize(&document.content, &self.tokenizer);
        let mut term_frequencies: BTreeMap<String, u32> = BTreeMap::new();
        for token in &tokens {
            *term_frequencies.entry(token.clone()).or_insert(0) += 1;
        }

        let position = match (self.positions.get(&document.id).copied(), self.policy) {
            (Some(_), DuplicatePolicy::InsertOnly) => {
                debug!("Ignoring duplicate document {}", document.id);
                return false;
            }
            (Some(position), DuplicatePolicy::Upsert) => {
                self.retract(position);
                self.document_lengths[position] = tokens.len();
                self.documents[position] = StoredDocument {
                    id: document.id,
                    metadata: document.metadata,
                    term_frequencies: BTreeMap::new(),
                };
                position
            }
            (None, _) => {
                let position = self.documents.len();
                self.positions.insert(document.id.clone(), position);
                self.document_lengths.push(tokens.len());
                self.documents.push(StoredDocument {
                    id: document.id,
                    metadata: document.metadata,
                    term_frequencies: BTreeMap::new(),
                });
                position
            }
        };

        self.total_length += tokens.len();
        for (term, frequency) in &term_frequencies {
            self.inverted_index
                .entry(term.clone())
                .or_default()
                .push(Posting {
                    doc: position,
                    frequency: *frequency,
                });
        }
        self.documents[position].term_frequencies = term_frequencies;
        true
    }

    /// Index many documents; returns how many were inserted or replaced
    pub fn add_documents(&mut self, documents: impl IntoIterator<Item = LexicalDocument>) -> usize {
        documents
            .into_iter()
            .fold(0, |added, document| added + usize::from(self.add_document(document)))
    }

    /// Remove a stored document's postings and length before it is replaced
    fn retract(&mut self, position: usize) {
        let terms: Vec<String> = self.documents[position]
            .term_frequencies
            .keys()
            .cloned()
            .collect();
        for term in terms {
            if let Some(postings) = self.inverted_index.get_mut(&term) {
                postings.retain(|posting| posting.doc != position);
                if postings.is_empty() {
                    self.inverted_index.remove(&term);
                }
            }
        }
        self.total_length -= self.document_lengths[position];
    }

    fn idf(&self, docs_with_term: usize) -> f64 {
        let n = self.documents.len() as f64;
        let n_t = docs_with_term as f64;
        (1.0 + (n - n_t + 0.5) / (n_t + 0.5) + self.params.epsilon).ln()
    }

    /// Rank documents against a query. Terms missing from the vocabulary
    /// contribute nothing; only documents matching at least one term are
    /// returned. Ties keep insertion order.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if k == 0 || self.documents.is_empty() {
            return Vec::new();
        }

        let Bm25Params { k1, b, .. } = self.params;
        let avg_len = self.average_document_length();
        let mut scores: Vec<Option<f64>> = vec![None; self.documents.len()];

        for term in tokenize(query, &self.tokenizer) {
            let Some(postings) = self.inverted_index.get(&term) else {
                continue;
            };
            let idf = self.idf(postings.len());

            for posting in postings {
                let tf = f64::from(posting.frequency);
                let length_ratio = if avg_len > 0.0 {
                    self.document_lengths[posting.doc] as f64 / avg_len
                } else {
                    0.0
                };
                let term_score = idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
                *scores[posting.doc].get_or_insert(0.0) += term_score;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter_map(|(doc, score)| score.map(|score| (doc, score)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(doc, score)| SearchHit {
                id: self.documents[doc].id.clone(),
                score,
                metadata: self.documents[doc].metadata.clone(),
            })
            .collect()
    }

    pub fn get_stats(&self) -> IndexStats {
        IndexStats {
            document_count: self.documents.len(),
            vocabulary_size: self.inverted_index.len(),
            total_postings: self.inverted_index.values().map(Vec::len).sum(),
            average_document_length: self.average_document_length(),
            params: self.params,
            tokenizer: self.tokenizer,
            policy: self.policy,
        }
    }

    /// Write the whole index as `<dir>/<name>.json`
    pub fn save(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.json"));
        let tmp_path = dir.join(format!("{name}.json.tmp"));

        let bytes = serde_json::to_vec(self)?;
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;

        info!(
            "Saved lexical index ({} documents) to {}",
            self.documents.len(),
            path.display()
        );
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LexicalIndexError::Missing(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut index: Self = serde_json::from_slice(&bytes)
            .map_err(|err| LexicalIndexError::Corrupt(format!("{}: {err}", path.display())))?;
        index.check_consistency()?;
        index.positions = index
            .documents
            .iter()
            .enumerate()
            .map(|(position, document)| (document.id.clone(), position))
            .collect();

        debug!(
            "Loaded lexical index ({} documents) from {}",
            index.documents.len(),
            path.display()
        );
        Ok(index)
    }

    fn check_consistency(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(LexicalIndexError::Corrupt(format!(
                "format version {} (expected {FORMAT_VERSION})",
                self.version
            )));
        }
        self.params
            .validate()
            .map_err(LexicalIndexError::Corrupt)?;
        if self.document_lengths.len() != self.documents.len() {
            return Err(LexicalIndexError::Corrupt(
                "document lengths do not match documents".into(),
            ));
        }
        if self.document_lengths.iter().sum::<usize>() != self.total_length {
            return Err(LexicalIndexError::Corrupt("total length mismatch".into()));
        }
        let dangling = self
            .inverted_index
            .values()
            .flatten()
            .any(|posting| posting.doc >= self.documents.len());
        if dangling {
            return Err(LexicalIndexError::Corrupt(
                "posting refers to a missing document".into(),
            ));
        }
        Ok(())
    }
}
