use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::fusion::{FusionEngine, RankedFile};
use crate::result::{RetrievalQuery, RetrievalResult, SearchSource, SearchStats};
use cloi_codebase_indexer::{IndexStats, ProjectIndex};
use cloi_vector_store::VectorHit;
use log::{debug, info, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Instant;

/// Locates the files most likely responsible for an error by querying the
/// lexical and vector indices of one project and fusing their hits.
///
/// Owns the [`ProjectIndex`]; the indices are loaded or rebuilt on the first
/// search.
pub struct HybridRetrieval {
    config: RetrievalConfig,
    index: ProjectIndex,
    fusion_engine: FusionEngine,
    cache: Option<LruCache<RetrievalQuery, RetrievalResult>>,
    /// Index generation the cached results were computed against
    cache_generation: u64,
}

impl HybridRetrieval {
    pub fn new(config: RetrievalConfig, index: ProjectIndex) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        let cache = NonZeroUsize::new(config.cache_size)
            .filter(|_| config.enable_cache)
            .map(LruCache::new);
        let cache_generation = index.generation();
        let fusion_engine = FusionEngine::new(config.clone());

        Ok(Self {
            config,
            index,
            fusion_engine,
            cache,
            cache_generation,
        })
    }

    /// Rank the project's files against `query`.
    ///
    /// A query that cannot be embedded is answered from lexical hits alone.
    /// When neither index has a candidate the best-guess file, if given, is
    /// reported as the root cause.
    pub async fn search(&mut self, query: &RetrievalQuery) -> Result<RetrievalResult> {
        let start = Instant::now();

        let error_text = query.error_text.trim();
        let actual = error_text.chars().count();
        if actual < self.config.min_query_length {
            return Err(RetrievalError::QueryTooShort {
                min: self.config.min_query_length,
                actual,
            });
        }

        self.index.ensure_ready().await?;
        self.sync_cache_generation();

        let key = RetrievalQuery {
            error_text: error_text.to_string(),
            best_guess_file: query
                .best_guess_file
                .as_deref()
                .map(|guess| self.normalize_path(guess)),
        };
        debug!("Hybrid search for: '{error_text}'");

        if let Some(cache) = self.cache.as_mut()
            && let Some(cached) = cache.get(&key)
        {
            info!("Cache hit for query: '{error_text}'");
            let mut result = cached.clone();
            result.stats.cache_hit = true;
            result.stats.total_time_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let mut stats = SearchStats::default();
        let pool = self.config.candidate_pool_size;

        // Stage 1: lexical search
        let lexical_start = Instant::now();
        let lexical_hits = self
            .index
            .lexical()
            .map(|lexical| lexical.search(error_text, pool))
            .unwrap_or_default();
        stats.lexical_time_ms = lexical_start.elapsed().as_millis() as u64;
        stats.lexical_count = lexical_hits.len();
        debug!("Lexical search found {} hits", lexical_hits.len());

        // Stage 2: semantic search
        let semantic_start = Instant::now();
        let semantic_hits = match self.semantic_search(error_text, pool).await? {
            Some(hits) => hits,
            None => {
                stats.lexical_only = true;
                Vec::new()
            }
        };
        stats.semantic_time_ms = semantic_start.elapsed().as_millis() as u64;
        stats.semantic_count = semantic_hits.len();
        debug!("Semantic search found {} hits", semantic_hits.len());

        // Stage 3: fusion by file
        let fusion_start = Instant::now();
        let ranked = self.fusion_engine.fuse(
            &lexical_hits,
            &semantic_hits,
            key.best_guess_file.as_deref(),
        );
        stats.fusion_time_ms = fusion_start.elapsed().as_millis() as u64;
        stats.candidate_files = ranked
            .iter()
            .filter(|file| file.span.source != SearchSource::BestGuess)
            .count();

        stats.total_time_ms = start.elapsed().as_millis() as u64;
        let result = self.assemble(ranked, stats);

        info!(
            "Retrieval completed in {}ms: root cause {:?}, {} related files",
            result.stats.total_time_ms,
            result.root_cause_file,
            result.related_files.len()
        );

        if let Some(cache) = self.cache.as_mut() {
            cache.put(key, result.clone());
        }

        Ok(result)
    }

    /// Vector hits for `text`, or `None` when there is nothing to search or
    /// the query could not be embedded.
    async fn semantic_search(&mut self, text: &str, k: usize) -> Result<Option<Vec<VectorHit>>> {
        if !self.index.vectors().is_some_and(|vectors| !vectors.is_empty()) {
            debug!("Vector index is empty, ranking by lexical hits only");
            return Ok(None);
        }

        let embedding = match self.index.embed_query(text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!("Query embedding failed, ranking by lexical hits only: {err}");
                return Ok(None);
            }
        };

        match self.index.vectors() {
            Some(vectors) => Ok(Some(vectors.search(&embedding, k)?)),
            None => Ok(None),
        }
    }

    fn assemble(&self, ranked: Vec<RankedFile>, stats: SearchStats) -> RetrievalResult {
        let mut files = ranked.into_iter();
        let root = files.next();
        let related: Vec<RankedFile> = files.take(self.config.related_files).collect();

        let per_file = root
            .iter()
            .chain(related.iter())
            .map(|file| (file.file_path.clone(), file.span.clone()))
            .collect();

        RetrievalResult {
            root_cause_file: root.map(|file| file.file_path),
            related_files: related.into_iter().map(|file| file.file_path).collect(),
            per_file,
            stats,
        }
    }

    /// Absolute paths under the project root become root-relative, matching
    /// the paths the indices store.
    fn normalize_path(&self, path: &str) -> String {
        Path::new(path)
            .strip_prefix(&self.index.config().root_dir)
            .ok()
            .filter(|_| Path::new(path).is_absolute())
            .map(|relative| relative.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    fn sync_cache_generation(&mut self) {
        let generation = self.index.generation();
        if generation == self.cache_generation {
            return;
        }
        if let Some(cache) = self.cache.as_mut()
            && !cache.is_empty()
        {
            cache.clear();
            info!("Cache cleared after index rebuild");
        }
        self.cache_generation = generation;
    }

    /// Rebuild both indices from source and drop cached results
    pub async fn rebuild(&mut self) -> Result<IndexStats> {
        let stats = self.index.rebuild().await?;
        self.sync_cache_generation();
        Ok(stats)
    }

    /// Clear search cache
    pub fn clear_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
            info!("Search cache cleared");
        }
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| CacheStats {
                size: cache.len(),
                capacity: cache.cap().get(),
            })
            .unwrap_or_default()
    }

    /// Get configuration
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    /// Stop the embedding service if the index started it
    pub async fn close(&mut self) -> Result<()> {
        Ok(self.index.close().await?)
    }

    pub fn into_index(self) -> ProjectIndex {
        self.index
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloi_codebase_indexer::IndexerConfig;
    use cloi_embeddings::{EmbeddingBackend, EmbeddingConfig, EmbeddingError};
    use cloi_vector_store::VectorIndexConfig;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    /// An embedding service that never comes up
    struct OfflineBackend;

    #[async_trait]
    impl EmbeddingBackend for OfflineBackend {
        async fn request_embedding(&self, _text: &str) -> cloi_embeddings::Result<Vec<Value>> {
            Err(EmbeddingError::ServiceUnavailable("offline".to_string()))
        }

        async fn recover(&mut self) -> cloi_embeddings::Result<()> {
            Err(EmbeddingError::ServiceUnavailable("offline".to_string()))
        }
    }

    fn offline_retrieval(root: &Path, config: RetrievalConfig) -> HybridRetrieval {
        let indexer_config = IndexerConfig {
            embedding: EmbeddingConfig {
                dimension: 8,
                batch_delay_ms: 0,
                ..Default::default()
            },
            vector: VectorIndexConfig {
                dimension: 8,
                ..Default::default()
            },
            ..IndexerConfig::for_project(root)
        };
        let index =
            ProjectIndex::with_backend(indexer_config, Box::new(OfflineBackend)).expect("index");
        HybridRetrieval::new(config, index).expect("retrieval")
    }

    fn project() -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        fs::write(
            dir.path().join("src/config.py"),
            "import json\n\ndef load_config(path):\n    with open(path) as fh:\n        return json.load(fh)\n",
        )
        .expect("write");
        fs::write(
            dir.path().join("src/report.py"),
            "def render_report(rows):\n    return '\\n'.join(str(row) for row in rows)\n",
        )
        .expect("write");
        dir
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = project();
        let index = ProjectIndex::with_backend(
            IndexerConfig {
                embedding: EmbeddingConfig {
                    dimension: 8,
                    ..Default::default()
                },
                vector: VectorIndexConfig {
                    dimension: 8,
                    ..Default::default()
                },
                ..IndexerConfig::for_project(dir.path())
            },
            Box::new(OfflineBackend),
        )
        .expect("index");
        let config = RetrievalConfig {
            candidate_pool_size: 0,
            ..Default::default()
        };

        assert!(matches!(
            HybridRetrieval::new(config, index),
            Err(RetrievalError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_short_query_rejected_before_indexing() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::default());

        let err = retrieval
            .search(&RetrievalQuery::new("  x  "))
            .await
            .expect_err("too short");
        assert!(matches!(err, RetrievalError::QueryTooShort { min: 2, actual: 1 }));
        assert!(!retrieval.index().is_loaded());
    }

    #[test_log::test(tokio::test)]
    async fn test_offline_service_degrades_to_lexical() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::default());

        let result = retrieval
            .search(&RetrievalQuery::new("KeyError in load_config while reading json"))
            .await
            .expect("search");

        assert!(result.stats.lexical_only);
        assert_eq!(result.stats.semantic_count, 0);
        assert_eq!(result.root_cause_file.as_deref(), Some("src/config.py"));
        let span = result.span("src/config.py").expect("span");
        assert_eq!(span.source, SearchSource::Lexical);
    }

    #[tokio::test]
    async fn test_best_guess_when_nothing_matches() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::default());
        let guess = dir.path().join("src/main.py");

        let result = retrieval
            .search(
                &RetrievalQuery::new("zzzq qqqz")
                    .with_best_guess(guess.to_string_lossy().into_owned()),
            )
            .await
            .expect("search");

        assert_eq!(result.root_cause_file.as_deref(), Some("src/main.py"));
        assert!(result.related_files.is_empty());
        assert_eq!(result.stats.candidate_files, 0);
        assert_eq!(
            result.span("src/main.py").map(|span| span.source),
            Some(SearchSource::BestGuess)
        );
    }

    #[tokio::test]
    async fn test_cache_hit_and_clear() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::default());
        let query = RetrievalQuery::new("render_report rows");

        let first = retrieval.search(&query).await.expect("search");
        assert!(!first.stats.cache_hit);
        let second = retrieval.search(&query).await.expect("search");
        assert!(second.stats.cache_hit);
        assert_eq!(second.root_cause_file, first.root_cause_file);
        assert_eq!(retrieval.cache_stats().size, 1);

        retrieval.clear_cache();
        let third = retrieval.search(&query).await.expect("search");
        assert!(!third.stats.cache_hit);
    }

    #[tokio::test]
    async fn test_rebuild_invalidates_cache() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::default());
        let query = RetrievalQuery::new("render_report rows");

        retrieval.search(&query).await.expect("search");
        retrieval.rebuild().await.expect("rebuild");
        assert_eq!(retrieval.cache_stats().size, 0);

        let again = retrieval.search(&query).await.expect("search");
        assert!(!again.stats.cache_hit);
    }

    #[tokio::test]
    async fn test_uncached_config() {
        let dir = project();
        let mut retrieval = offline_retrieval(dir.path(), RetrievalConfig::uncached());
        let query = RetrievalQuery::new("render_report rows");

        retrieval.search(&query).await.expect("search");
        let again = retrieval.search(&query).await.expect("search");
        assert!(!again.stats.cache_hit);
        assert_eq!(retrieval.cache_stats(), CacheStats::default());
    }
}
