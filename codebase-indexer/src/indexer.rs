use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::state::{IndexState, relative_to};
use cloi_code_chunker::Chunker;
use cloi_embeddings::{Embedding, EmbeddingBackend, EmbeddingPipeline};
use cloi_lexical_index::{LexicalDocument, LexicalIndex};
use cloi_vector_store::VectorIndex;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Base name of the lexical index file in the state directory
pub const LEXICAL_INDEX_NAME: &str = "lexical";

/// Base name of the vector index files in the state directory
pub const VECTOR_INDEX_NAME: &str = "vectors";

/// Statistics about one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_discovered: usize,
    pub files_processed: usize,
    /// Too large or not UTF-8
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_failed: usize,
    pub elapsed_ms: u64,
}

struct SourceFile {
    relative: PathBuf,
    content: String,
    hash: String,
}

#[derive(Default)]
struct SourceScan {
    files: Vec<SourceFile>,
    discovered: usize,
    skipped: usize,
    failed: usize,
}

enum LoadOutcome {
    Loaded,
    Stale(String),
}

/// Both indices of one project plus the manifest they were built from.
///
/// This is the single owner of the project's state directory: loads, saves
/// and rebuilds all go through `&mut self`.
pub struct ProjectIndex {
    config: IndexerConfig,
    chunker: Chunker,
    pipeline: EmbeddingPipeline,
    lexical: Option<LexicalIndex>,
    vectors: Option<VectorIndex>,
    state: Option<IndexState>,
    generation: u64,
}

impl ProjectIndex {
    /// Index backed by the HTTP embedding service from `config.embedding`
    pub fn new(config: IndexerConfig) -> Result<Self> {
        config.validate().map_err(IndexerError::Config)?;
        let pipeline = EmbeddingPipeline::http(config.embedding.clone())?;
        Self::with_pipeline(config, pipeline)
    }

    /// Index backed by any embedding backend
    pub fn with_backend(config: IndexerConfig, backend: Box<dyn EmbeddingBackend>) -> Result<Self> {
        config.validate().map_err(IndexerError::Config)?;
        let pipeline = EmbeddingPipeline::new(backend, config.embedding.clone())?;
        Self::with_pipeline(config, pipeline)
    }

    fn with_pipeline(config: IndexerConfig, pipeline: EmbeddingPipeline) -> Result<Self> {
        let chunker = Chunker::new(config.chunker.clone())?;
        Ok(Self {
            config,
            chunker,
            pipeline,
            lexical: None,
            vectors: None,
            state: None,
            generation: 0,
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.lexical.is_some() && self.vectors.is_some() && self.state.is_some()
    }

    pub fn lexical(&self) -> Option<&LexicalIndex> {
        self.lexical.as_ref()
    }

    pub fn vectors(&self) -> Option<&VectorIndex> {
        self.vectors.as_ref()
    }

    pub fn state(&self) -> Option<&IndexState> {
        self.state.as_ref()
    }

    /// Bumped every time new indices are installed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Load the persisted indices, rebuilding from source when they are
    /// absent, damaged, or out of date with the files on disk.
    ///
    /// Returns the build statistics when a rebuild happened.
    pub async fn ensure_ready(&mut self) -> Result<Option<IndexStats>> {
        if self.is_loaded() {
            return Ok(None);
        }

        match self.try_load()? {
            LoadOutcome::Loaded => Ok(None),
            LoadOutcome::Stale(reason) => {
                info!(
                    "Rebuilding index for {}: {reason}",
                    self.config.root_dir.display()
                );
                self.rebuild().await.map(Some)
            }
        }
    }

    /// Chunk, embed and index every supported file, then persist both
    /// indices and the manifest.
    pub async fn rebuild(&mut self) -> Result<IndexStats> {
        let start = Instant::now();
        let state_dir = self.config.state_path();
        let scan = self.scan_sources()?;

        let mut stats = IndexStats {
            files_discovered: scan.discovered,
            files_skipped: scan.skipped,
            files_failed: scan.failed,
            ..Default::default()
        };

        let mut lexical = LexicalIndex::new(self.config.bm25, self.config.tokenizer)?
            .with_policy(self.config.duplicate_policy);
        let mut vectors = VectorIndex::with_config(&self.config.vector)?;
        let mut state = IndexState::new(self.config.root_dir.clone(), self.config.vector.dimension);

        let mut chunk_counts = Vec::with_capacity(scan.files.len());
        let mut chunks = Vec::new();
        for source in &scan.files {
            let file_path = source.relative.to_string_lossy().into_owned();
            let file_chunks = self.chunker.chunk_str(&source.content, &file_path);

            for chunk in &file_chunks {
                lexical.add_document(LexicalDocument::new(
                    chunk.id(),
                    chunk.content.clone(),
                    serde_json::to_value(chunk.location())?,
                ));
            }

            stats.files_processed += 1;
            stats.chunks_created += file_chunks.len();
            chunk_counts.push(file_chunks.len());
            chunks.extend(file_chunks);
        }

        let (embedded, report) = self.pipeline.embed_batch(chunks).await;
        stats.chunks_embedded = report.succeeded;
        stats.chunks_failed = report.failed;

        let mut embedded_per_file: HashMap<String, usize> = HashMap::new();
        let entries: Vec<_> = embedded
            .into_iter()
            .filter_map(|item| {
                let embedding = item.embedding?;
                *embedded_per_file
                    .entry(item.chunk.file_path.clone())
                    .or_default() += 1;
                Some((item.chunk, embedding))
            })
            .collect();
        vectors.add(entries)?;

        for (source, chunk_count) in scan.files.into_iter().zip(chunk_counts) {
            let embedded_count = embedded_per_file
                .get(&*source.relative.to_string_lossy())
                .copied()
                .unwrap_or_default();
            state.record_file(source.relative, source.hash, chunk_count, embedded_count);
        }
        state.mark_built();

        lexical.save(&state_dir, LEXICAL_INDEX_NAME)?;
        vectors.save(&state_dir, VECTOR_INDEX_NAME)?;
        // manifest last: without it the next load rebuilds
        state.save(&state_dir)?;

        self.install(lexical, vectors, state);

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Indexing complete: {} files processed, {} chunks created, {} embedded, {} failed in {}ms",
            stats.files_processed,
            stats.chunks_created,
            stats.chunks_embedded,
            stats.chunks_failed,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    /// Embed query text with the same pipeline the chunks went through
    pub async fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        Ok(self.pipeline.embed(text).await?)
    }

    /// Stop the embedding service if this index started it
    pub async fn close(&mut self) -> Result<()> {
        Ok(self.pipeline.close().await?)
    }

    /// Supported files under the root, honouring `.gitignore` and the
    /// configured ignore patterns, in path order
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root_dir;

        let mut overrides = OverrideBuilder::new(root);
        for pattern in &self.config.ignore_patterns {
            overrides.add(&format!("!{pattern}"))?;
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .overrides(overrides.build()?);

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_some_and(|kind| kind.is_file())
                && self.config.is_supported_file(path)
            {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn scan_sources(&self) -> Result<SourceScan> {
        let files = self.discover_files()?;
        let mut scan = SourceScan {
            discovered: files.len(),
            ..Default::default()
        };

        for path in files {
            let relative = relative_to(&self.config.root_dir, &path)?;

            let size = match fs::metadata(&path) {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    warn!("Failed to stat {}: {err}", path.display());
                    scan.failed += 1;
                    continue;
                }
            };
            if size > self.config.max_file_bytes {
                debug!("Skipping {} ({size} bytes)", relative.display());
                scan.skipped += 1;
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Failed to read {}: {err}", path.display());
                    scan.failed += 1;
                    continue;
                }
            };
            let Ok(content) = String::from_utf8(bytes) else {
                debug!("Skipping non-UTF-8 file {}", relative.display());
                scan.skipped += 1;
                continue;
            };

            scan.files.push(SourceFile {
                hash: IndexState::hash_content(content.as_bytes()),
                relative,
                content,
            });
        }

        Ok(scan)
    }

    fn try_load(&mut self) -> Result<LoadOutcome> {
        let state_dir = self.config.state_path();
        let dimension = self.config.vector.dimension;

        let state = match IndexState::load(&state_dir) {
            Ok(state) => state,
            Err(err) if err.needs_rebuild() => return Ok(LoadOutcome::Stale(err.to_string())),
            Err(err) => return Err(err),
        };
        if state.dimension != dimension {
            return Ok(LoadOutcome::Stale(format!(
                "index was built with dimension {}, configured {dimension}",
                state.dimension
            )));
        }

        let current: BTreeMap<PathBuf, String> = self
            .scan_sources()?
            .files
            .into_iter()
            .map(|source| (source.relative, source.hash))
            .collect();
        let diff = state.diff(&current);
        if !diff.is_empty() {
            return Ok(LoadOutcome::Stale(format!(
                "{} added, {} changed, {} removed files",
                diff.added.len(),
                diff.changed.len(),
                diff.removed.len()
            )));
        }

        let lexical_path = state_dir.join(format!("{LEXICAL_INDEX_NAME}.json"));
        let lexical = match LexicalIndex::load(&lexical_path) {
            Ok(lexical) => lexical,
            Err(err) if err.needs_rebuild() => return Ok(LoadOutcome::Stale(err.to_string())),
            Err(err) => return Err(err.into()),
        };
        if lexical.is_empty() && state.total_chunks > 0 {
            return Ok(LoadOutcome::Stale("lexical index is empty".to_string()));
        }

        let vectors = match VectorIndex::load(&state_dir, VECTOR_INDEX_NAME) {
            Ok(vectors) => vectors,
            Err(err) if err.needs_rebuild() => return Ok(LoadOutcome::Stale(err.to_string())),
            Err(err) => return Err(err.into()),
        };
        if vectors.dimension() != dimension {
            return Ok(LoadOutcome::Stale(format!(
                "vector index has dimension {}, configured {dimension}",
                vectors.dimension()
            )));
        }
        if vectors.is_empty() && state.embedded_chunks > 0 {
            return Ok(LoadOutcome::Stale(format!(
                "vector index came back empty, manifest records {} embedded chunks",
                state.embedded_chunks
            )));
        }
        if state.embedded_chunks < state.total_chunks {
            return Ok(LoadOutcome::Stale(format!(
                "{} of {} chunks lack embeddings",
                state.total_chunks - state.embedded_chunks,
                state.total_chunks
            )));
        }

        info!(
            "Loaded index for {} ({} files, {} chunks, {} vectors)",
            self.config.root_dir.display(),
            state.files.len(),
            lexical.len(),
            vectors.len()
        );
        self.install(lexical, vectors, state);
        Ok(LoadOutcome::Loaded)
    }

    fn install(&mut self, lexical: LexicalIndex, vectors: VectorIndex, state: IndexState) {
        self.lexical = Some(lexical);
        self.vectors = Some(vectors);
        self.state = Some(state);
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloi_embeddings::EmbeddingConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn index_for(root: &Path) -> ProjectIndex {
        let config = IndexerConfig {
            embedding: EmbeddingConfig {
                dimension: 8,
                ..Default::default()
            },
            vector: cloi_vector_store::VectorIndexConfig {
                dimension: 8,
                ..Default::default()
            },
            ..IndexerConfig::for_project(root)
        };
        ProjectIndex::new(config).expect("index")
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn test_file_discovery() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(root, "src/main.rs", "fn main() {}");
        write(root, "app/views.py", "def main(): pass");
        write(root, "README.md", "ignored");
        write(root, "node_modules/dep/index.js", "module.exports = 1;");
        write(root, "generated/out.js", "var x;");
        write(root, "web/app.min.js", "var y;");
        write(root, ".gitignore", "generated/\n");

        let index = index_for(root);
        let relative: Vec<PathBuf> = index
            .discover_files()
            .expect("Failed to discover")
            .iter()
            .map(|path| relative_to(root, path).expect("relative"))
            .collect();

        assert_eq!(
            relative,
            vec![PathBuf::from("app/views.py"), PathBuf::from("src/main.rs")]
        );
    }

    #[test]
    fn test_scan_skips_large_and_binary_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(root, "small.rs", "fn a() {}");
        write(root, "big.rs", &"// filler\n".repeat(200));
        fs::write(root.join("blob.rs"), [0xff, 0xfe, 0x00, 0x80]).expect("write");

        let mut index = index_for(root);
        index.config.max_file_bytes = 100;
        let scan = index.scan_sources().expect("scan");

        assert_eq!(scan.discovered, 3);
        assert_eq!(scan.skipped, 2);
        assert_eq!(scan.files.len(), 1);
        assert_eq!(scan.files[0].relative, PathBuf::from("small.rs"));
        assert_eq!(scan.files[0].hash, IndexState::hash_content(b"fn a() {}"));
    }

    #[test]
    fn test_new_index_is_not_loaded() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let index = index_for(temp_dir.path());
        assert!(!index.is_loaded());
        assert_eq!(index.generation(), 0);
        assert!(index.lexical().is_none());
    }
}
