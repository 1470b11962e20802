use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Indexer error: {0}")]
    Indexer(#[from] cloi_codebase_indexer::IndexerError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] cloi_vector_store::VectorStoreError),

    #[error("Query too short: minimum {min} characters, got {actual}")]
    QueryTooShort { min: usize, actual: usize },

    #[error("Invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
