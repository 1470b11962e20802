use crate::backend::{AnnBackend, AnnBackendKind};
use crate::error::{Result, VectorStoreError};
use cloi_code_chunker::Chunk;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Configuration for a vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Embedding dimension D
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// ANN backend name
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_dimension() -> usize {
    768
}

fn default_backend() -> String {
    AnnBackendKind::FlatL2.name().to_string()
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            backend: default_backend(),
        }
    }
}

impl VectorIndexConfig {
    pub fn backend_kind(&self) -> Result<AnnBackendKind> {
        self.backend.parse()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension must be greater than 0".into());
        }
        self.backend_kind().map(|_| ()).map_err(|err| err.to_string())
    }
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: usize,
    /// `1 / (1 + distance)`, in (0, 1]
    pub score: f32,
    /// Squared L2 distance to the query
    pub distance: f32,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexStats {
    pub dimension: usize,
    pub size: usize,
    pub backend: String,
}

/// Sidecar stored next to the backend snapshot
#[derive(Serialize, Deserialize)]
struct Sidecar {
    dimension: usize,
    size: usize,
    backend: String,
    metadata: Vec<(usize, Chunk)>,
}

/// Monotonically decreasing map from distance to a bounded similarity
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    1.0 / (1.0 + distance.max(0.0))
}

/// Fixed-dimension vectors with chunk metadata, on top of an [`AnnBackend`].
///
/// Ids are assigned sequentially and always equal the backend's labels.
/// Whenever the two could disagree (a failed load) both are reset together.
#[derive(Debug)]
pub struct VectorIndex {
    backend: Box<dyn AnnBackend>,
    metadata: BTreeMap<usize, Chunk>,
}

impl VectorIndex {
    /// Empty index over the default backend
    pub fn create(dimension: usize) -> Result<Self> {
        Self::with_config(&VectorIndexConfig {
            dimension,
            ..Default::default()
        })
    }

    pub fn with_config(config: &VectorIndexConfig) -> Result<Self> {
        let kind = config.backend_kind()?;
        config.validate().map_err(VectorStoreError::InvalidConfig)?;
        Ok(Self {
            backend: kind.create(config.dimension),
            metadata: BTreeMap::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    pub fn backend_kind(&self) -> AnnBackendKind {
        self.backend.kind()
    }

    /// Stored metadata of one vector
    pub fn get(&self, id: usize) -> Option<&Chunk> {
        self.metadata.get(&id)
    }

    /// Add chunks with their embeddings, returning the assigned ids.
    ///
    /// Every vector is checked before anything is inserted, so a dimension
    /// mismatch leaves the index unchanged.
    pub fn add(&mut self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<Vec<usize>> {
        let dimension = self.dimension();
        if let Some((_, vector)) = entries.iter().find(|(_, vector)| vector.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let mut ids = Vec::with_capacity(entries.len());
        for (chunk, vector) in entries {
            let id = self.backend.add(&vector)?;
            self.metadata.insert(id, chunk);
            ids.push(id);
        }

        debug!("Added {} vectors (size {})", ids.len(), self.len());
        Ok(ids)
    }

    /// Nearest chunks to `query`, best first. Asking for more than the
    /// population returns the whole population.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if query.len() != self.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbors = self.backend.search(query, k)?;
        let mut hits: Vec<VectorHit> = neighbors
            .labels
            .iter()
            .zip(&neighbors.distances)
            .filter_map(|(&id, &distance)| {
                let chunk = self.metadata.get(&id)?;
                Some(VectorHit {
                    id,
                    score: distance_to_similarity(distance),
                    distance,
                    chunk: chunk.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    pub fn get_stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            dimension: self.dimension(),
            size: self.len(),
            backend: self.backend_kind().name().to_string(),
        }
    }

    /// `{dir}/{name}.bin` (backend snapshot) and `{dir}/{name}.meta.json`
    pub fn paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{name}.bin")),
            dir.join(format!("{name}.meta.json")),
        )
    }

    pub fn exists(dir: &Path, name: &str) -> bool {
        let (backend_path, sidecar_path) = Self::paths(dir, name);
        backend_path.exists() && sidecar_path.exists()
    }

    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        fs::create_dir_all(dir)?;
        let (backend_path, sidecar_path) = Self::paths(dir, name);

        self.backend.write(&backend_path)?;

        let sidecar = Sidecar {
            dimension: self.dimension(),
            size: self.len(),
            backend: self.backend_kind().name().to_string(),
            metadata: self
                .metadata
                .iter()
                .map(|(id, chunk)| (*id, chunk.clone()))
                .collect(),
        };
        let tmp_path = dir.join(format!("{name}.meta.json.tmp"));
        fs::write(&tmp_path, serde_json::to_vec(&sidecar)?)?;
        fs::rename(&tmp_path, &sidecar_path)?;

        info!(
            "Saved vector index ({} vectors, dim {}) to {}",
            self.len(),
            self.dimension(),
            dir.display()
        );
        Ok(())
    }

    /// Load a saved index.
    ///
    /// A missing or unreadable sidecar is an error. A missing, unreadable or
    /// inconsistent backend snapshot is not: the index comes back empty with
    /// the recorded dimension.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let (backend_path, sidecar_path) = Self::paths(dir, name);

        let bytes = match fs::read(&sidecar_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(VectorStoreError::Missing(sidecar_path));
            }
            Err(err) => return Err(err.into()),
        };
        let sidecar: Sidecar = serde_json::from_slice(&bytes).map_err(|err| {
            VectorStoreError::Corrupt(format!("{}: {err}", sidecar_path.display()))
        })?;
        if sidecar.dimension == 0 {
            return Err(VectorStoreError::Corrupt(format!(
                "{}: dimension is 0",
                sidecar_path.display()
            )));
        }
        let kind: AnnBackendKind = sidecar.backend.parse()?;

        let fresh = || Self {
            backend: kind.create(sidecar.dimension),
            metadata: BTreeMap::new(),
        };

        let backend = match kind.read(&backend_path) {
            Ok(backend) => backend,
            Err(err) => {
                warn!(
                    "Vector index snapshot {} unreadable ({err}); starting empty with dimension {}",
                    backend_path.display(),
                    sidecar.dimension
                );
                return Ok(fresh());
            }
        };

        let metadata: BTreeMap<usize, Chunk> = sidecar.metadata.into_iter().collect();
        let ids_match = metadata.len() == backend.len()
            && metadata.keys().copied().eq(0..backend.len());
        if backend.dimension() != sidecar.dimension || backend.len() != sidecar.size || !ids_match
        {
            warn!(
                "Vector index at {} is inconsistent (snapshot {} x {}, sidecar {} x {}, {} metadata entries); starting empty",
                dir.display(),
                backend.len(),
                backend.dimension(),
                sidecar.size,
                sidecar.dimension,
                metadata.len()
            );
            return Ok(fresh());
        }

        debug!(
            "Loaded vector index ({} vectors, dim {}) from {}",
            backend.len(),
            backend.dimension(),
            dir.display()
        );
        Ok(Self { backend, metadata })
    }
}
