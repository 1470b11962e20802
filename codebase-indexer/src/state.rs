use crate::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Indexing state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// SHA256 hash of file content
    pub content_hash: String,

    /// Number of chunks generated
    pub chunk_count: usize,

    /// Chunks that received an embedding
    pub embedded_count: usize,
}

/// How the files on disk differ from the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub changed: Vec<PathBuf>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Manifest of what the persisted indices were built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    /// Version of the index format
    pub version: u32,

    /// Root directory that was indexed
    pub root_dir: PathBuf,

    /// Embedding dimension of the vector index
    pub dimension: usize,

    /// Root-relative path -> file state
    pub files: BTreeMap<PathBuf, FileState>,

    /// Total number of chunks across all files
    pub total_chunks: usize,

    /// Chunks stored in the vector index
    pub embedded_chunks: usize,

    /// When the last full build finished
    pub built_at: Option<SystemTime>,
}

impl IndexState {
    pub const CURRENT_VERSION: u32 = 1;
    pub const STATE_FILENAME: &'static str = "index-state.json";

    pub fn new(root_dir: PathBuf, dimension: usize) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            root_dir,
            dimension,
            files: BTreeMap::new(),
            total_chunks: 0,
            embedded_chunks: 0,
            built_at: None,
        }
    }

    /// Load the manifest. Absent, unparsable and version-mismatched
    /// manifests are errors that ask for a rebuild.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let state_path = state_dir.join(Self::STATE_FILENAME);
        let content = match fs::read_to_string(&state_path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(IndexerError::StateMissing(state_path));
            }
            Err(err) => return Err(err.into()),
        };

        let state: IndexState = serde_json::from_str(&content)
            .map_err(|err| IndexerError::StateCorrupt(format!("{}: {err}", state_path.display())))?;

        if state.version != Self::CURRENT_VERSION {
            return Err(IndexerError::StateCorrupt(format!(
                "index state version mismatch: {} vs {}",
                state.version,
                Self::CURRENT_VERSION
            )));
        }

        Ok(state)
    }

    /// Save the manifest to disk
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;

        let state_path = state_dir.join(Self::STATE_FILENAME);
        let tmp_path = state_dir.join(format!("{}.tmp", Self::STATE_FILENAME));
        fs::write(&tmp_path, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp_path, &state_path)?;

        Ok(())
    }

    /// Record a file after it was chunked and embedded
    pub fn record_file(
        &mut self,
        relative_path: PathBuf,
        content_hash: String,
        chunk_count: usize,
        embedded_count: usize,
    ) {
        if let Some(old_state) = self.files.get(&relative_path) {
            self.total_chunks = self.total_chunks.saturating_sub(old_state.chunk_count);
            self.embedded_chunks = self.embedded_chunks.saturating_sub(old_state.embedded_count);
        }

        self.total_chunks += chunk_count;
        self.embedded_chunks += embedded_count;
        self.files.insert(
            relative_path,
            FileState {
                content_hash,
                chunk_count,
                embedded_count,
            },
        );
    }

    pub fn mark_built(&mut self) {
        self.built_at = Some(SystemTime::now());
    }

    /// Compare against current `relative path -> content hash` pairs
    pub fn diff(&self, current: &BTreeMap<PathBuf, String>) -> StateDiff {
        let mut diff = StateDiff::default();

        for (path, hash) in current {
            match self.files.get(path) {
                None => diff.added.push(path.clone()),
                Some(file_state) if file_state.content_hash != *hash => {
                    diff.changed.push(path.clone());
                }
                Some(_) => {}
            }
        }
        diff.removed = self
            .files
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();

        diff
    }

    /// SHA256 of file content, hex encoded
    pub fn hash_content(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }
}

pub(crate) fn relative_to(root_dir: &Path, file_path: &Path) -> Result<PathBuf> {
    file_path
        .strip_prefix(root_dir)
        .map(Path::to_path_buf)
        .map_err(|_| {
            IndexerError::InvalidPath(format!(
                "Path {} is not relative to root {}",
                file_path.display(),
                root_dir.display()
            ))
        })
}
