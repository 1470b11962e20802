use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during vector index operations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// The configured ANN backend is not compiled into this crate
    #[error("ANN backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Sidecar file absent
    #[error("Vector index not found: {}", .0.display())]
    Missing(PathBuf),

    /// Sidecar or backend snapshot unreadable
    #[error("Vector index corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),
}

impl VectorStoreError {
    /// Whether rebuilding from source is the right response
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Self::Missing(_) | Self::Corrupt(_))
    }
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
