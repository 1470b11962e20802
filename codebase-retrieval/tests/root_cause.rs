//! End-to-end retrieval over a small project with an in-process embedding
//! backend.

use anyhow::Result;
use async_trait::async_trait;
use cloi_codebase_indexer::{IndexerConfig, ProjectIndex};
use cloi_codebase_retrieval::{HybridRetrieval, RetrievalConfig, RetrievalQuery, SearchSource};
use cloi_embeddings::{EmbeddingBackend, EmbeddingConfig, EmbeddingError};
use cloi_vector_store::VectorIndexConfig;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// One dimension per keyword; the vector is the normalized keyword count
const KEYWORDS: &[&str] = &[
    "add", "sum", "function", "parse", "config", "json", "request", "handle", "user", "total",
];

struct KeywordBackend {
    offline: Arc<AtomicBool>,
}

#[async_trait]
impl EmbeddingBackend for KeywordBackend {
    async fn request_embedding(&self, text: &str) -> cloi_embeddings::Result<Vec<Value>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Request {
                status: 500,
                body: "model crashed".to_string(),
            });
        }

        let mut counts = vec![0.0f64; KEYWORDS.len()];
        for word in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .map(str::to_ascii_lowercase)
        {
            if let Some(slot) = KEYWORDS.iter().position(|keyword| *keyword == word) {
                counts[slot] += 1.0;
            }
        }
        let norm = counts.iter().map(|c| c * c).sum::<f64>().sqrt().max(1.0);
        Ok(counts.into_iter().map(|c| json!(c / norm)).collect())
    }

    async fn recover(&mut self) -> cloi_embeddings::Result<()> {
        Ok(())
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, content).expect("write file");
}

/// A 40-line file holding one `add(a, b)` function
fn add_module() -> String {
    let mut lines = vec![
        "/** add: the sum of two numbers */".to_string(),
        "function add(a, b) {".to_string(),
        "  const total = a + b;".to_string(),
    ];
    while lines.len() < 38 {
        lines.push(format!("  // padding line {}", lines.len() + 1));
    }
    lines.push("  return total;".to_string());
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}

fn project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let add = add_module();
    assert_eq!(add.lines().count(), 40);
    write(dir.path(), "src/math.js", &add);
    write(
        dir.path(),
        "src/config.js",
        "function parseConfig(text) {\n  const raw = JSON.parse(text);\n  return raw.config;\n}\n\nmodule.exports = { parseConfig };\n",
    );
    write(
        dir.path(),
        "src/server.py",
        "def handle(request):\n    user = request.user\n    return user.name\n",
    );
    dir
}

fn retrieval_for(root: &Path, offline: Arc<AtomicBool>) -> Result<HybridRetrieval> {
    let dimension = KEYWORDS.len();
    let config = IndexerConfig {
        embedding: EmbeddingConfig {
            dimension,
            batch_delay_ms: 0,
            ..Default::default()
        },
        vector: VectorIndexConfig {
            dimension,
            ..Default::default()
        },
        ..IndexerConfig::for_project(root)
    };
    let index = ProjectIndex::with_backend(config, Box::new(KeywordBackend { offline }))?;
    Ok(HybridRetrieval::new(RetrievalConfig::default(), index)?)
}

#[test_log::test(tokio::test)]
async fn add_function_is_the_root_cause() -> Result<()> {
    let dir = project();
    let mut retrieval = retrieval_for(dir.path(), Arc::default())?;

    let result = retrieval.search(&RetrievalQuery::new("add function sum")).await?;

    assert_eq!(result.root_cause_file.as_deref(), Some("src/math.js"));
    let span = result.span("src/math.js").expect("span of root cause");
    assert_eq!((span.start_line, span.end_line), (1, 40));
    assert_eq!(span.source, SearchSource::Semantic);
    assert!(!result.stats.lexical_only);
    assert_eq!(result.related_files.len(), 2);
    assert_eq!(result.stats.candidate_files, 3);
    Ok(())
}

#[tokio::test]
async fn best_guess_breaks_a_close_call() -> Result<()> {
    let dir = project();
    let mut retrieval = retrieval_for(dir.path(), Arc::default())?;

    let plain = retrieval.search(&RetrievalQuery::new("parse config user")).await?;
    let guessed = retrieval
        .search(
            &RetrievalQuery::new("parse config user")
                .with_best_guess(dir.path().join("src/server.py").to_string_lossy()),
        )
        .await?;

    assert_eq!(plain.root_cause_file.as_deref(), Some("src/config.js"));
    assert_eq!(guessed.root_cause_file.as_deref(), Some("src/server.py"));

    let plain_server = plain.span("src/server.py").expect("server ranked").score;
    let guessed_server = guessed.span("src/server.py").expect("server ranked").score;
    assert!((guessed_server - plain_server - 0.1).abs() < 1e-5);
    Ok(())
}

#[tokio::test]
async fn query_embedding_failure_falls_back_to_lexical() -> Result<()> {
    let dir = project();
    let offline = Arc::new(AtomicBool::new(false));
    let mut retrieval = retrieval_for(dir.path(), Arc::clone(&offline))?;

    // build with a healthy service, then lose it
    let warm = retrieval.search(&RetrievalQuery::new("handle request")).await?;
    assert!(!warm.stats.lexical_only);
    offline.store(true, Ordering::SeqCst);

    let result = retrieval
        .search(&RetrievalQuery::new("JSON.parse failed in parseConfig"))
        .await?;

    assert!(result.stats.lexical_only);
    assert_eq!(result.stats.semantic_count, 0);
    assert_eq!(result.root_cause_file.as_deref(), Some("src/config.js"));
    assert_eq!(
        result.span("src/config.js").map(|span| span.source),
        Some(SearchSource::Lexical)
    );
    Ok(())
}

#[tokio::test]
async fn reopened_project_answers_from_persisted_indices() -> Result<()> {
    let dir = project();
    let first = retrieval_for(dir.path(), Arc::default())?
        .search(&RetrievalQuery::new("add function sum"))
        .await?;

    let mut reopened = retrieval_for(dir.path(), Arc::default())?;
    let second = reopened.search(&RetrievalQuery::new("add function sum")).await?;

    assert_eq!(reopened.index().generation(), 1);
    assert_eq!(second.root_cause_file, first.root_cause_file);
    assert_eq!(second.related_files, first.related_files);
    Ok(())
}
