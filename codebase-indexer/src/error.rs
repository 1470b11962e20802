use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    Chunker(#[from] cloi_code_chunker::ChunkerError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] cloi_embeddings::EmbeddingError),

    #[error("Lexical index error: {0}")]
    LexicalIndex(#[from] cloi_lexical_index::LexicalIndexError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] cloi_vector_store::VectorStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index state not found: {}", .0.display())]
    StateMissing(PathBuf),

    #[error("Index state corrupt: {0}")]
    StateCorrupt(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Ignore error: {0}")]
    Ignore(String),
}

impl IndexerError {
    /// Whether the persisted index is gone or damaged and should be rebuilt
    /// from source
    pub fn needs_rebuild(&self) -> bool {
        match self {
            Self::StateMissing(_) | Self::StateCorrupt(_) => true,
            Self::LexicalIndex(err) => err.needs_rebuild(),
            Self::VectorStore(err) => err.needs_rebuild(),
            _ => false,
        }
    }
}

impl From<ignore::Error> for IndexerError {
    fn from(err: ignore::Error) -> Self {
        IndexerError::Ignore(err.to_string())
    }
}

impl From<toml::de::Error> for IndexerError {
    fn from(err: toml::de::Error) -> Self {
        IndexerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
