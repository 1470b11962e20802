//! # Cloi Vector Store
//!
//! Fixed-dimension embeddings of code chunks behind a narrow nearest-neighbour
//! interface, persisted per project.
//!
//! ## Layout on disk
//!
//! ```text
//! {dir}/{name}.bin        backend snapshot (bincode)
//! {dir}/{name}.meta.json  {dimension, size, backend, metadata: [[id, chunk], ...]}
//! ```
//!
//! A missing or damaged snapshot never fails a load: the index comes back
//! empty with the recorded dimension and is refilled by the next build.
//!
//! ## Example
//!
//! ```no_run
//! use cloi_vector_store::VectorIndex;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let index = VectorIndex::load(Path::new(".cloi/index"), "vectors")?;
//! let hits = index.search(&vec![0.0; index.dimension()], 5)?;
//! println!("Found {} similar chunks", hits.len());
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod index;

pub use backend::{AnnBackend, AnnBackendKind, FlatL2Backend, Neighbors};
pub use error::{Result, VectorStoreError};
pub use index::{
    VectorHit, VectorIndex, VectorIndexConfig, VectorIndexStats, distance_to_similarity,
};
