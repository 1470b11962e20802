use crate::error::{Result, VectorStoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Nearest neighbours of one query, closest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    pub distances: Vec<f32>,
    pub labels: Vec<usize>,
}

/// Narrow nearest-neighbour capability the vector index is built on.
///
/// Labels are assigned sequentially in insertion order, starting at 0.
pub trait AnnBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> AnnBackendKind;

    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one vector, returning its label
    fn add(&mut self, vector: &[f32]) -> Result<usize>;

    /// At most `k` neighbours by ascending distance
    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors>;

    fn write(&self, path: &Path) -> Result<()>;

    fn read(path: &Path) -> Result<Self>
    where
        Self: Sized;
}

/// ANN backends compiled into this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnBackendKind {
    /// Exact scan over squared L2 distance
    FlatL2,
}

impl AnnBackendKind {
    pub fn name(self) -> &'static str {
        match self {
            AnnBackendKind::FlatL2 => "flat_l2",
        }
    }

    /// Empty backend of the given dimension
    pub fn create(self, dimension: usize) -> Box<dyn AnnBackend> {
        match self {
            AnnBackendKind::FlatL2 => Box::new(FlatL2Backend::new(dimension)),
        }
    }

    pub fn read(self, path: &Path) -> Result<Box<dyn AnnBackend>> {
        match self {
            AnnBackendKind::FlatL2 => Ok(Box::new(FlatL2Backend::read(path)?)),
        }
    }
}

impl FromStr for AnnBackendKind {
    type Err = VectorStoreError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "flat_l2" | "flat" => Ok(AnnBackendKind::FlatL2),
            other => Err(VectorStoreError::BackendUnavailable(format!(
                "`{other}` is not a supported backend (available: flat_l2)"
            ))),
        }
    }
}

impl fmt::Display for AnnBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct FlatSnapshot {
    version: u32,
    dimension: usize,
    data: Vec<f32>,
}

/// Brute-force backend: every search scans all stored vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Backend {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Backend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    fn vector(&self, label: usize) -> &[f32] {
        let start = label * self.dimension;
        &self.data[start..start + self.dimension]
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

impl AnnBackend for FlatL2Backend {
    fn kind(&self) -> AnnBackendKind {
        AnnBackendKind::FlatL2
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let label = self.len();
        self.data.extend_from_slice(vector);
        Ok(label)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
        self.check_dimension(query)?;

        let mut scored: Vec<(f32, usize)> = (0..self.len())
            .map(|label| (squared_l2(query, self.vector(label)), label))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(Neighbors {
            distances: scored.iter().map(|(distance, _)| *distance).collect(),
            labels: scored.iter().map(|(_, label)| *label).collect(),
        })
    }

    fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = FlatSnapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            data: self.data.clone(),
        };
        let bytes = bincode::serialize(&snapshot)?;

        let tmp_path = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let snapshot: FlatSnapshot = bincode::deserialize(&bytes)
            .map_err(|err| VectorStoreError::Corrupt(format!("{}: {err}", path.display())))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(VectorStoreError::Corrupt(format!(
                "snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        if snapshot.dimension == 0 || snapshot.data.len() % snapshot.dimension != 0 {
            return Err(VectorStoreError::Corrupt(format!(
                "{} values do not divide into vectors of dimension {}",
                snapshot.data.len(),
                snapshot.dimension
            )));
        }

        Ok(Self {
            dimension: snapshot.dimension,
            data: snapshot.data,
        })
    }
}
