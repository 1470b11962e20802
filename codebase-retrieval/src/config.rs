use serde::{Deserialize, Serialize};

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of candidates to retrieve from each index before fusion
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,

    /// Files reported after the root-cause file
    #[serde(default = "default_related_files")]
    pub related_files: usize,

    /// Weight of the normalized BM25 score added to the vector similarity.
    /// Small on purpose: lexical hits break ties and backstop recall.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Added to the score of the upstream best-guess file when it shows up
    /// among the candidates
    #[serde(default = "default_best_guess_boost")]
    pub best_guess_boost: f32,

    /// Minimum query length in characters, after trimming
    #[serde(default = "default_min_query_length")]
    pub min_query_length: usize,

    /// Enable caching of retrieval results
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Cache size (number of queries to cache)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_candidate_pool_size() -> usize {
    50
}

fn default_related_files() -> usize {
    3
}

fn default_lexical_weight() -> f32 {
    0.05
}

fn default_best_guess_boost() -> f32 {
    0.1
}

fn default_min_query_length() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool_size: default_candidate_pool_size(),
            related_files: default_related_files(),
            lexical_weight: default_lexical_weight(),
            best_guess_boost: default_best_guess_boost(),
            min_query_length: default_min_query_length(),
            enable_cache: true,
            cache_size: default_cache_size(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.candidate_pool_size == 0 {
            return Err("candidate_pool_size must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.lexical_weight) {
            return Err(format!(
                "lexical_weight must be in [0.0, 1.0], got {}",
                self.lexical_weight
            ));
        }

        if !(0.0..=1.0).contains(&self.best_guess_boost) {
            return Err(format!(
                "best_guess_boost must be in [0.0, 1.0], got {}",
                self.best_guess_boost
            ));
        }

        if self.enable_cache && self.cache_size == 0 {
            return Err("cache_size must be > 0 when the cache is enabled".to_string());
        }

        Ok(())
    }

    /// Rank by vector similarity alone
    pub fn semantic_only() -> Self {
        Self {
            lexical_weight: 0.0,
            best_guess_boost: 0.0,
            ..Default::default()
        }
    }

    pub fn uncached() -> Self {
        Self {
            enable_cache: false,
            ..Default::default()
        }
    }
}
