//! # Cloi Embeddings
//!
//! Turns code chunks into fixed-dimension vectors through an external
//! embedding service (`GET /health`, `POST /embed {text}`).
//!
//! ## Features
//!
//! - Lazy start of the service as a supervised child process, with health
//!   polling until it is ready
//! - Code-aware preprocessing and a per-request character budget
//! - Repair of malformed vectors: every embedding has exactly `dimension`
//!   finite components
//! - Partial-failure tolerant batches with a fixed inter-batch delay
//!
//! ## Example
//!
//! ```no_run
//! use cloi_embeddings::{EmbeddingConfig, EmbeddingPipeline, ServiceSpawn};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EmbeddingConfig {
//!         spawn: Some(ServiceSpawn::python_script("bin/codebert_service.py", 3090)),
//!         ..Default::default()
//!     };
//!     let mut pipeline = EmbeddingPipeline::http(config)?;
//!     let embedding = pipeline.embed("fn hello() { println!(\"Hello\"); }").await?;
//!     println!("Generated a {}-dimensional embedding", embedding.len());
//!     pipeline.close().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod pipeline;
mod preprocess;
mod process;
mod repair;

pub use client::{EmbeddingBackend, EmbeddingClient};
pub use config::{EmbeddingConfig, HealthPolicy, ServiceSpawn};
pub use error::{EmbeddingError, Result};
pub use pipeline::{BatchReport, EmbeddedChunk, Embedding, EmbeddingPipeline};
pub use preprocess::{preprocess, truncate_chars};
pub use process::ServiceProcess;
pub use repair::{RepairReport, SENTINEL, repair_embedding, sanitize_non_finite_literals};

/// Embedding dimension D of the CodeBERT service
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Port the embedding service listens on by default
pub const DEFAULT_SERVICE_PORT: u16 = 3090;
