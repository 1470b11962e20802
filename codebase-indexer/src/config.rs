use crate::error::{IndexerError, Result};
use cloi_code_chunker::ChunkerConfig;
use cloi_embeddings::EmbeddingConfig;
use cloi_lexical_index::{Bm25Params, DuplicatePolicy, TokenizerOptions};
use cloi_vector_store::VectorIndexConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for indexing one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Project root to index
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Where both indices and the manifest live; relative paths resolve
    /// against `root_dir`
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub chunker: ChunkerConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub bm25: Bm25Params,

    #[serde(default)]
    pub tokenizer: TokenizerOptions,

    /// Behaviour of the lexical index on a repeated chunk id
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    #[serde(default)]
    pub vector: VectorIndexConfig,

    /// File patterns to ignore (gitignore-style), on top of `.gitignore`
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// File extensions (without dot) that are indexed
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Larger files are skipped
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".cloi/index")
}

fn default_ignore_patterns() -> Vec<String> {
    [
        "node_modules",
        "target",
        ".git",
        ".cloi",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "*.min.js",
        "*.map",
    ]
    .iter()
    .map(|pattern| (*pattern).to_string())
    .collect()
}

fn default_extensions() -> Vec<String> {
    [
        "rs", "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go", "java", "kt", "scala", "c",
        "h", "cc", "cpp", "hpp", "cs", "rb", "php", "swift", "sh", "bash",
    ]
    .iter()
    .map(|ext| (*ext).to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            state_dir: default_state_dir(),
            chunker: ChunkerConfig::default(),
            embedding: EmbeddingConfig::default(),
            bm25: Bm25Params::default(),
            tokenizer: TokenizerOptions::default(),
            duplicate_policy: DuplicatePolicy::default(),
            vector: VectorIndexConfig::default(),
            ignore_patterns: default_ignore_patterns(),
            extensions: default_extensions(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl IndexerConfig {
    /// Default configuration for the project at `root_dir`
    pub fn for_project(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|err| IndexerError::Config(format!("{}: {err}", path.display())))
    }

    /// Absolute-or-root-relative state directory
    pub fn state_path(&self) -> PathBuf {
        if self.state_dir.is_absolute() {
            self.state_dir.clone()
        } else {
            self.root_dir.join(&self.state_dir)
        }
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.root_dir.is_dir() {
            return Err(format!(
                "Root directory does not exist or is not a directory: {}",
                self.root_dir.display()
            ));
        }
        if self.extensions.is_empty() {
            return Err("extensions must not be empty".to_string());
        }
        if self.max_file_bytes == 0 {
            return Err("max_file_bytes must be greater than 0".to_string());
        }
        if self.vector.dimension != self.embedding.dimension {
            return Err(format!(
                "vector.dimension ({}) must equal embedding.dimension ({})",
                self.vector.dimension, self.embedding.dimension
            ));
        }

        self.chunker.validate()?;
        self.embedding.validate()?;
        self.bm25.validate()?;
        self.vector.validate()?;
        Ok(())
    }
}
