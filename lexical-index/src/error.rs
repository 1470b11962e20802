use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexicalIndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lexical index not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Lexical index corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LexicalIndexError {
    /// Whether rebuilding from source is the right response
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Self::Missing(_) | Self::Corrupt(_))
    }
}

pub type Result<T> = std::result::Result<T, LexicalIndexError>;
