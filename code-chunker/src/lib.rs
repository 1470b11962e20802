//! # Cloi Code Chunker
//!
//! Boundary-aware line chunking of source files for hybrid retrieval.
//!
//! ## Philosophy
//!
//! A chunk is a contiguous, possibly overlapping line range of one file that
//! is retrieved as a unit. The chunker tries to:
//! - Keep whole functions/classes together (heuristic boundary detection)
//! - Carry a bounded number of lines forward as overlap between chunks
//! - Give every chunk the file's import preamble, so embeddings see
//!   dependency context even in the middle of a file
//! - Cover every source line at least once
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (extension)
//!     │
//!     ├──> Import Preamble Extraction
//!     │
//!     ├──> BoundaryDetector (brace depth / indentation)
//!     │    └─> spans {start, end, kind}
//!     │
//!     └──> Packing
//!          ├─> Greedy span packing up to `chunk_size` lines
//!          ├─> Overlap carried from the previous chunk
//!          ├─> Fixed windows when no spans were found
//!          └─> Emit Chunk[]
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use cloi_code_chunker::{Chunker, ChunkerConfig};
//!
//! # fn main() -> Result<(), cloi_code_chunker::ChunkerError> {
//! let chunker = Chunker::new(ChunkerConfig::default())?;
//!
//! let code = r#"
//! fn process_data(input: &str) -> Result<Data> {
//!     let parsed = parse(input)?;
//!     validate(&parsed)?;
//!     Ok(parsed.into())
//! }
//! "#;
//!
//! let chunks = chunker.chunk_str(code, "src/example.rs");
//! println!("Generated {} chunks", chunks.len());
//! # Ok(())
//! # }
//! ```

mod boundary;
mod chunker;
mod config;
mod error;
mod language;
mod strategy;

pub use boundary::{
    BoundaryDetector, BraceBoundaryDetector, IndentBoundaryDetector, Span, SpanKind,
    detector_for,
};
pub use chunker::Chunker;
pub use config::ChunkerConfig;
pub use error::ChunkerError;
pub use language::{ImportBlock, Language, Scoping};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A contiguous line range of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source file path
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Text handed to the embedding model: import preamble + code
    pub content: String,

    /// The code lines exactly as they appear in the file
    pub display_content: String,

    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

/// Metadata about a chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name without directory
    pub file_name: String,

    /// File extension without the dot (empty when absent)
    pub file_ext: String,

    /// Parent directory of the file
    pub directory: String,

    /// Whether the file has an import preamble
    pub has_imports: bool,

    /// Programming language name
    #[serde(default)]
    pub language: Option<String>,

    /// Kind of the first detected span in the chunk
    #[serde(default)]
    pub kind: Option<SpanKind>,
}

impl ChunkMetadata {
    /// Derive path-based metadata for a file
    pub fn for_path(file_path: &str, language: Language) -> Self {
        let path = Path::new(file_path);
        Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_ext: path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
            directory: path
                .parent()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
            has_imports: false,
            language: Some(language.name().to_string()),
            kind: None,
        }
    }
}

/// Where a chunk lives; small enough to ride along as search-hit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Chunk {
    /// Stable key of the chunk: `filePath:startLine-endLine`
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    /// Number of source lines covered
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn location(&self) -> ChunkLocation {
        ChunkLocation {
            file_path: self.file_path.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }
}
