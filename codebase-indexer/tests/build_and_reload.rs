//! Building, reloading and self-healing of a project index, with an
//! in-process embedding backend.

use anyhow::Result;
use async_trait::async_trait;
use cloi_codebase_indexer::{IndexState, IndexerConfig, ProjectIndex, VECTOR_INDEX_NAME};
use cloi_embeddings::{EmbeddingBackend, EmbeddingConfig, EmbeddingError};
use cloi_vector_store::{VectorIndex, VectorIndexConfig};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 16;

/// Bag-of-words hashing into `DIMENSION` buckets
struct HashingBackend {
    requests: Arc<AtomicUsize>,
    fail_containing: Option<&'static str>,
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    async fn request_embedding(&self, text: &str) -> cloi_embeddings::Result<Vec<Value>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_containing
            && text.contains(marker)
        {
            return Err(EmbeddingError::Request {
                status: 500,
                body: "model error".to_string(),
            });
        }

        let mut buckets = vec![0.0f64; DIMENSION];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let bucket = word.bytes().fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            buckets[bucket % DIMENSION] += 1.0;
        }
        Ok(buckets.into_iter().map(|v| json!(v)).collect())
    }

    async fn recover(&mut self) -> cloi_embeddings::Result<()> {
        Ok(())
    }
}

fn config_for(root: &Path) -> IndexerConfig {
    IndexerConfig {
        embedding: EmbeddingConfig {
            dimension: DIMENSION,
            batch_delay_ms: 0,
            ..Default::default()
        },
        vector: VectorIndexConfig {
            dimension: DIMENSION,
            ..Default::default()
        },
        ..IndexerConfig::for_project(root)
    }
}

fn open(root: &Path, fail_containing: Option<&'static str>) -> Result<(ProjectIndex, Arc<AtomicUsize>)> {
    let requests = Arc::new(AtomicUsize::new(0));
    let backend = HashingBackend {
        requests: Arc::clone(&requests),
        fail_containing,
    };
    let index = ProjectIndex::with_backend(config_for(root), Box::new(backend))?;
    Ok((index, requests))
}

fn write_project(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("src"))?;
    fs::write(
        root.join("src/math.js"),
        "const assert = require('assert');\n\nfunction add(a, b) {\n  return a + b;\n}\n\nmodule.exports = { add };\n",
    )?;
    fs::write(
        root.join("src/server.py"),
        "import os\n\n\ndef handle(request):\n    return os.environ.get('PORT')\n",
    )?;
    fs::write(root.join("notes.txt"), "not indexed")?;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn first_use_builds_and_persists() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;

    let (mut index, requests) = open(dir.path(), None)?;
    let stats = index.ensure_ready().await?.expect("fresh project is built");

    assert_eq!(stats.files_discovered, 2);
    assert_eq!(stats.files_processed, 2);
    assert_eq!(stats.chunks_created, 2);
    assert_eq!(stats.chunks_embedded, 2);
    assert_eq!(requests.load(Ordering::SeqCst), 2);

    let state_dir = dir.path().join(".cloi/index");
    assert!(state_dir.join(IndexState::STATE_FILENAME).exists());
    assert!(state_dir.join("lexical.json").exists());
    assert!(VectorIndex::exists(&state_dir, VECTOR_INDEX_NAME));

    // already loaded: no work
    assert_eq!(index.ensure_ready().await?, None);
    assert_eq!(index.generation(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn unchanged_project_is_loaded_not_rebuilt() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;
    open(dir.path(), None)?.0.ensure_ready().await?;

    let (mut reopened, requests) = open(dir.path(), None)?;
    assert_eq!(reopened.ensure_ready().await?, None);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
    assert_eq!(reopened.lexical().map(|lexical| lexical.len()), Some(2));
    assert_eq!(reopened.vectors().map(|vectors| vectors.len()), Some(2));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn edited_file_triggers_rebuild() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;
    open(dir.path(), None)?.0.ensure_ready().await?;

    fs::write(dir.path().join("src/extra.rs"), "fn extra() -> u32 {\n    1\n}\n")?;

    let (mut reopened, _) = open(dir.path(), None)?;
    let stats = reopened.ensure_ready().await?.expect("rebuilt");
    assert_eq!(stats.files_processed, 3);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn corrupted_vector_snapshot_triggers_rebuild() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;
    open(dir.path(), None)?.0.ensure_ready().await?;

    let state_dir = dir.path().join(".cloi/index");
    let (snapshot, _) = VectorIndex::paths(&state_dir, VECTOR_INDEX_NAME);
    fs::write(snapshot, b"garbage")?;

    let (mut reopened, requests) = open(dir.path(), None)?;
    assert!(reopened.ensure_ready().await?.is_some());
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert_eq!(reopened.vectors().map(|vectors| vectors.len()), Some(2));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn failed_embeddings_stay_lexically_searchable() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;

    let (mut index, _) = open(dir.path(), Some("handle"))?;
    let stats = index.ensure_ready().await?.expect("built");
    assert_eq!(stats.chunks_embedded, 1);
    assert_eq!(stats.chunks_failed, 1);

    let hits = index.lexical().map(|lexical| lexical.search("handle request", 5)).unwrap_or_default();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["file_path"], "src/server.py");
    assert_eq!(index.vectors().map(|vectors| vectors.len()), Some(1));

    let state = index.state().expect("state installed");
    assert_eq!(state.embedded_chunks, 1);
    assert_eq!(state.total_chunks, 2);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn missing_embeddings_are_filled_on_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    write_project(dir.path())?;

    // every text contains the empty marker, so the service fails for all of them
    let (mut offline, _) = open(dir.path(), Some(""))?;
    let stats = offline.ensure_ready().await?.expect("built");
    assert_eq!(stats.chunks_embedded, 0);
    assert_eq!(offline.vectors().map(|vectors| vectors.len()), Some(0));

    let (mut reopened, requests) = open(dir.path(), None)?;
    let stats = reopened.ensure_ready().await?.expect("rebuilt for missing embeddings");
    assert_eq!(stats.chunks_embedded, 2);
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert_eq!(reopened.vectors().map(|vectors| vectors.len()), Some(2));
    assert_eq!(reopened.state().map(|state| state.embedded_chunks), Some(2));
    Ok(())
}
