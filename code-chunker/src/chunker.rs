use crate::boundary::detector_for;
use crate::config::ChunkerConfig;
use crate::error::ChunkerError;
use crate::language::{ImportBlock, Language};
use crate::strategy::{FixedWindowStrategy, LineRange, SpanPackingStrategy};
use crate::{Chunk, ChunkMetadata};
use log::{debug, info};
use std::path::Path;

/// Main code chunker
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with the given configuration
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkerError> {
        config.validate().map_err(ChunkerError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a file from disk
    pub fn chunk_file(&self, path: &Path) -> Result<Vec<Chunk>, ChunkerError> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.chunk_str(&content, &path.to_string_lossy()))
    }

    /// Chunk a string of code. Blank input yields no chunks.
    pub fn chunk_str(&self, content: &str, file_path: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.iter().all(|line| line.trim().is_empty()) {
            return Vec::new();
        }

        let language = Language::from_path(Path::new(file_path));
        let imports = if self.config.include_imports {
            language.extract_imports(&lines, self.config.max_import_lines)
        } else {
            ImportBlock::default()
        };

        let mut spans = if self.config.preserve_semantics {
            detector_for(language)
                .map(|detector| detector.detect(&lines))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        // `import { a, b } from ...` is preamble, not a block
        if let Some(last_import) = imports.last_line {
            spans.retain(|span| span.end > last_import);
        }

        info!(
            "Chunking {file_path} ({} lines, {} spans, {} language)",
            lines.len(),
            spans.len(),
            language.name()
        );

        let ranges = if spans.is_empty() {
            FixedWindowStrategy::new(&self.config).windows(lines.len())
        } else {
            SpanPackingStrategy::new(&self.config).pack(&spans, &lines)
        };

        let header = imports.header();
        let chunks: Vec<Chunk> = ranges
            .into_iter()
            .map(|range| self.build_chunk(range, &lines, file_path, language, &imports, &header))
            .collect();

        debug!("Generated {} chunks for {file_path}", chunks.len());
        chunks
    }

    fn build_chunk(
        &self,
        range: LineRange,
        lines: &[&str],
        file_path: &str,
        language: Language,
        imports: &ImportBlock,
        header: &str,
    ) -> Chunk {
        let display_content = lines[range.start..=range.end].join("\n");

        // chunks that already show the import block don't repeat it
        let needs_header = !imports.is_empty()
            && imports
                .last_line
                .is_some_and(|last_import| range.start > last_import);
        let content = if needs_header {
            format!("{header}\n\n{display_content}")
        } else {
            display_content.clone()
        };

        let mut metadata = ChunkMetadata::for_path(file_path, language);
        metadata.has_imports = !imports.is_empty();
        metadata.kind = range.kind;

        Chunk {
            file_path: file_path.to_string(),
            start_line: range.start + 1,
            end_line: range.end + 1,
            content,
            display_content,
            metadata,
        }
    }
}
