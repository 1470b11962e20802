use cloi_code_chunker::{Chunker, ChunkerConfig};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const SAMPLE_RUST_CODE: &str = r#"
use std::collections::HashMap;
use std::sync::Arc;

/// Main application structure
pub struct Application {
    config: Config,
    cache: Arc<HashMap<String, String>>,
}

impl Application {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: Arc::new(HashMap::new()),
        }
    }

    pub async fn handle_request(&self, request: Request) -> Result<Response, Error> {
        if !self.validate_request(&request) {
            return Err(Error::InvalidRequest);
        }

        if let Some(cached) = self.cache.get(&request.id) {
            return Ok(Response::from_cache(cached.clone()));
        }

        let result = self.process_internal(request).await?;
        Ok(Response::new(result))
    }

    fn validate_request(&self, request: &Request) -> bool {
        !request.id.is_empty() && request.payload.is_valid()
    }
}

#[derive(Debug)]
pub enum Error {
    InvalidRequest,
    ProcessingError(String),
}
"#;

const SAMPLE_PYTHON_CODE: &str = r#"
import os
from typing import Dict


class Application:
    def __init__(self, config: Dict[str, str]):
        self.config = config
        self.cache = {}

    def handle_request(self, request):
        if not request.id:
            raise ValueError("invalid request")
        if request.id in self.cache:
            return self.cache[request.id]
        return self.process(request)


def main():
    app = Application(dict(os.environ))
    return app
"#;

fn bench_semantic_vs_fixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("semantic_vs_fixed");
    let code = SAMPLE_RUST_CODE.repeat(10);

    for (name, config) in [
        ("semantic", ChunkerConfig::small()),
        (
            "fixed",
            ChunkerConfig {
                preserve_semantics: false,
                ..ChunkerConfig::small()
            },
        ),
    ] {
        let chunker = Chunker::new(config).unwrap();
        group.bench_with_input(BenchmarkId::new("mode", name), &code, |b, code| {
            b.iter(|| black_box(chunker.chunk_str(black_box(code), "app.rs")));
        });
    }

    group.finish();
}

fn bench_file_size_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_size_scaling");
    let chunker = Chunker::default();

    for size_multiplier in [1, 5, 10, 20] {
        let code = SAMPLE_RUST_CODE.repeat(size_multiplier);
        let size_kb = code.len() / 1024;

        group.throughput(Throughput::Bytes(code.len() as u64));
        group.bench_with_input(BenchmarkId::new("size_kb", size_kb), &code, |b, code| {
            b.iter(|| black_box(chunker.chunk_str(black_box(code), "app.rs")));
        });
    }

    group.finish();
}

fn bench_overlap_impact(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_impact");
    let code = SAMPLE_RUST_CODE.repeat(20);

    for overlap in [0, 10, 25, 50] {
        let config = ChunkerConfig {
            chunk_size: 100,
            overlap,
            ..Default::default()
        };
        let chunker = Chunker::new(config).unwrap();

        group.bench_with_input(BenchmarkId::new("overlap", overlap), &code, |b, code| {
            b.iter(|| black_box(chunker.chunk_str(black_box(code), "app.rs")));
        });
    }

    group.finish();
}

fn bench_indentation_detection(c: &mut Criterion) {
    let chunker = Chunker::new(ChunkerConfig::small()).unwrap();
    let code = SAMPLE_PYTHON_CODE.repeat(10);

    c.bench_function("indentation_detection", |b| {
        b.iter(|| black_box(chunker.chunk_str(black_box(&code), "app.py")));
    });
}

criterion_group!(
    benches,
    bench_semantic_vs_fixed,
    bench_file_size_scaling,
    bench_overlap_impact,
    bench_indentation_detection
);
criterion_main!(benches);
