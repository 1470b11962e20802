use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a caller knows about an error before retrieval runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// Error message, stack trace or description
    pub error_text: String,

    /// File the stack-trace parser suspects, relative to the project root
    /// or absolute
    #[serde(default)]
    pub best_guess_file: Option<String>,
}

impl RetrievalQuery {
    pub fn new(error_text: impl Into<String>) -> Self {
        Self {
            error_text: error_text.into(),
            best_guess_file: None,
        }
    }

    pub fn with_best_guess(mut self, file: impl Into<String>) -> Self {
        self.best_guess_file = Some(file.into());
        self
    }
}

/// Which index contributed a file's best span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Lexical,
    Semantic,
    /// Neither index; the upstream best guess
    BestGuess,
}

/// Best line range of one candidate file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSpan {
    pub start_line: usize,
    pub end_line: usize,

    /// Fused file score, higher is better
    pub score: f32,

    pub source: SearchSource,
}

/// Ranked files for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// File most likely responsible for the error
    pub root_cause_file: Option<String>,

    /// Next-best files, best first
    pub related_files: Vec<String>,

    /// Span and score of every reported file
    pub per_file: BTreeMap<String, FileSpan>,

    pub stats: SearchStats,
}

impl RetrievalResult {
    /// Root-cause file followed by the related files
    pub fn ranked_files(&self) -> impl Iterator<Item = &str> {
        self.root_cause_file
            .iter()
            .chain(self.related_files.iter())
            .map(String::as_str)
    }

    pub fn span(&self, file: &str) -> Option<&FileSpan> {
        self.per_file.get(file)
    }

    pub fn is_empty(&self) -> bool {
        self.root_cause_file.is_none()
    }
}

/// Search performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total search time in milliseconds
    pub total_time_ms: u64,

    /// Lexical search time in milliseconds
    pub lexical_time_ms: u64,

    /// Query embedding plus vector search time in milliseconds
    pub semantic_time_ms: u64,

    /// Fusion time in milliseconds
    pub fusion_time_ms: u64,

    /// Number of lexical hits
    pub lexical_count: usize,

    /// Number of vector hits
    pub semantic_count: usize,

    /// Distinct files among all hits
    pub candidate_files: usize,

    /// The query could not be embedded; only lexical hits were fused
    pub lexical_only: bool,

    /// Cache hit
    pub cache_hit: bool,
}
