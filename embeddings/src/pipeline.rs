use crate::client::{EmbeddingBackend, EmbeddingClient};
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use crate::preprocess::preprocess;
use crate::repair::{RepairReport, repair_embedding};
use cloi_code_chunker::Chunk;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::sleep;

/// Fixed-dimension vector bound to one chunk
pub type Embedding = Vec<f32>;

/// A chunk with either its embedding or the reason it has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Option<Embedding>,
    pub error: Option<String>,
}

impl EmbeddedChunk {
    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Outcome counts of one [`EmbeddingPipeline::embed_batch`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded, but the raw vector needed repair
    pub repaired: usize,
    pub elapsed_ms: u64,
}

/// Turns code text into embeddings of exactly `config.dimension` components.
///
/// The backend is started lazily on first use. A retryable failure triggers
/// one `recover()` and one retry before it is reported.
pub struct EmbeddingPipeline {
    backend: Box<dyn EmbeddingBackend>,
    config: EmbeddingConfig,
    ready: bool,
    recover_failed: bool,
}

impl EmbeddingPipeline {
    pub fn new(backend: Box<dyn EmbeddingBackend>, config: EmbeddingConfig) -> Result<Self> {
        config.validate().map_err(EmbeddingError::InvalidConfig)?;
        Ok(Self {
            backend,
            config,
            ready: false,
            recover_failed: false,
        })
    }

    /// Pipeline over the HTTP embedding service described by `config`
    pub fn http(config: EmbeddingConfig) -> Result<Self> {
        let client = EmbeddingClient::new(&config)?;
        Self::new(Box::new(client), config)
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub async fn embed(&mut self, text: &str) -> Result<Embedding> {
        let (embedding, _) = self.embed_with_report(text).await?;
        Ok(embedding)
    }

    /// Embed chunks in groups of `batch_size`, pausing `batch_delay` between
    /// groups. Failures are recorded per chunk; the batch always completes and
    /// keeps input order.
    pub async fn embed_batch(&mut self, chunks: Vec<Chunk>) -> (Vec<EmbeddedChunk>, BatchReport) {
        let start = Instant::now();
        let mut report = BatchReport {
            total: chunks.len(),
            ..Default::default()
        };
        let mut embedded = Vec::with_capacity(chunks.len());
        self.recover_failed = false;

        for (idx, chunk) in chunks.into_iter().enumerate() {
            if idx > 0 && idx % self.config.batch_size == 0 {
                sleep(self.config.batch_delay()).await;
            }

            let result = if self.recover_failed {
                Err(EmbeddingError::ServiceUnavailable(
                    "skipped after a failed service restart".to_string(),
                ))
            } else {
                self.embed_with_report(&chunk.content).await
            };

            match result {
                Ok((embedding, repair)) => {
                    report.succeeded += 1;
                    if !repair.is_clean() {
                        report.repaired += 1;
                    }
                    embedded.push(EmbeddedChunk {
                        chunk,
                        embedding: Some(embedding),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!("Failed to embed chunk {}: {err}", chunk.id());
                    report.failed += 1;
                    embedded.push(EmbeddedChunk {
                        chunk,
                        embedding: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Embedded {}/{} chunks ({} failed, {} repaired) in {}ms",
            report.succeeded, report.total, report.failed, report.repaired, report.elapsed_ms
        );
        (embedded, report)
    }

    /// Stop whatever the backend started
    pub async fn close(&mut self) -> Result<()> {
        self.ready = false;
        self.backend.shutdown().await
    }

    async fn embed_with_report(&mut self, text: &str) -> Result<(Embedding, RepairReport)> {
        let prepared = preprocess(text, self.config.max_chars);
        if prepared.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "text is empty after preprocessing".to_string(),
            ));
        }

        if !self.ready {
            self.recover().await?;
        }

        let raw = match self.backend.request_embedding(&prepared).await {
            Ok(raw) => raw,
            Err(err) if err.is_retryable() => {
                info!("Embedding service unavailable ({err}), restarting and retrying once");
                self.ready = false;
                self.recover().await?;
                self.backend.request_embedding(&prepared).await?
            }
            Err(err) => return Err(err),
        };

        let (embedding, repair) = repair_embedding(&raw, self.config.dimension);
        if !repair.is_clean() {
            debug!("Repaired embedding: {repair:?}");
        }
        Ok((embedding, repair))
    }

    async fn recover(&mut self) -> Result<()> {
        match self.backend.recover().await {
            Ok(()) => {
                self.ready = true;
                self.recover_failed = false;
                Ok(())
            }
            Err(err) => {
                self.recover_failed = true;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloi_code_chunker::ChunkMetadata;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        requests: Mutex<Vec<String>>,
        recoveries: AtomicUsize,
    }

    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<Vec<Value>>>>,
        recover_ok: bool,
        calls: Arc<Calls>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<Vec<Value>>>) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            let backend = Self {
                responses: Mutex::new(responses.into()),
                recover_ok: true,
                calls: Arc::clone(&calls),
            };
            (backend, calls)
        }
    }

    #[async_trait]
    impl EmbeddingBackend for ScriptedBackend {
        async fn request_embedding(&self, text: &str) -> Result<Vec<Value>> {
            self.calls.requests.lock().expect("lock").push(text.to_string());
            self.responses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(vec![json!(1.0); 3]))
        }

        async fn recover(&mut self) -> Result<()> {
            self.calls.recoveries.fetch_add(1, Ordering::SeqCst);
            if self.recover_ok {
                Ok(())
            } else {
                Err(EmbeddingError::ServiceUnavailable("down".to_string()))
            }
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimension: 3,
            batch_size: 2,
            batch_delay_ms: 0,
            ..Default::default()
        }
    }

    fn chunk(line: usize, content: &str) -> Chunk {
        Chunk {
            file_path: "src/lib.rs".to_string(),
            start_line: line,
            end_line: line,
            content: content.to_string(),
            display_content: content.to_string(),
            metadata: ChunkMetadata::default(),
        }
    }

    fn unavailable() -> EmbeddingError {
        EmbeddingError::ServiceUnavailable("warming up".to_string())
    }

    fn server_error() -> EmbeddingError {
        EmbeddingError::Request {
            status: 500,
            body: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn test_embed_preprocesses_and_repairs() {
        let (backend, calls) = ScriptedBackend::new(vec![Ok(vec![json!(1.0), json!("x")])]);
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let embedding = pipeline.embed("a\r\n\r\n\r\n\tb  ").await.expect("embed");
        assert_eq!(embedding, vec![1.0, 0.0, 0.0]);
        assert_eq!(*calls.requests.lock().expect("lock"), vec!["a\n\n    b".to_string()]);
        assert_eq!(calls.recoveries.load(Ordering::SeqCst), 1);

        pipeline.embed("c").await.expect("embed");
        // ready after the first call
        assert_eq!(calls.recoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let (backend, calls) = ScriptedBackend::new(Vec::new());
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let err = pipeline.embed(" \n\t ").await.expect_err("empty");
        assert!(matches!(err, EmbeddingError::InvalidInput(_)));
        assert_eq!(calls.recoveries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_once_after_unavailable() {
        let (backend, calls) = ScriptedBackend::new(vec![
            Err(unavailable()),
            Ok(vec![json!(0.5), json!(0.5), json!(0.5)]),
        ]);
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let embedding = pipeline.embed("fn main() {}").await.expect("embed");
        assert_eq!(embedding, vec![0.5, 0.5, 0.5]);
        assert_eq!(calls.recoveries.load(Ordering::SeqCst), 2);
        assert_eq!(calls.requests.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_not_retried() {
        let (backend, calls) = ScriptedBackend::new(vec![Err(server_error())]);
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let err = pipeline.embed("fn main() {}").await.expect_err("500");
        assert!(matches!(err, EmbeddingError::Request { status: 500, .. }));
        assert_eq!(calls.requests.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_batch_tolerates_partial_failure() {
        let (backend, _calls) = ScriptedBackend::new(vec![
            Ok(vec![json!(1.0), json!(2.0), json!(3.0)]),
            Err(server_error()),
            Ok(vec![json!(1.0), json!(2.0)]),
        ]);
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let chunks = vec![chunk(1, "a"), chunk(2, "b"), chunk(3, "c")];
        let (embedded, report) = pipeline.embed_batch(chunks).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.repaired, 1);
        let lines: Vec<usize> = embedded.iter().map(|e| e.chunk.start_line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert!(embedded[0].is_embedded());
        assert!(!embedded[1].is_embedded());
        assert!(embedded[1].error.as_deref().is_some_and(|e| e.contains("500")));
        assert_eq!(embedded[2].embedding, Some(vec![1.0, 2.0, 0.0]));
    }

    #[tokio::test]
    async fn test_batch_stops_contacting_service_after_failed_restart() {
        let (mut backend, calls) = ScriptedBackend::new(Vec::new());
        backend.recover_ok = false;
        let mut pipeline = EmbeddingPipeline::new(Box::new(backend), config()).expect("pipeline");

        let chunks = vec![chunk(1, "a"), chunk(2, "b"), chunk(3, "c")];
        let (embedded, report) = pipeline.embed_batch(chunks).await;

        assert_eq!(report.failed, 3);
        assert!(embedded.iter().all(|e| e.embedding.is_none() && e.error.is_some()));
        assert_eq!(calls.recoveries.load(Ordering::SeqCst), 1);
        assert!(calls.requests.lock().expect("lock").is_empty());
    }
}
