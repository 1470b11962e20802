/*!
# Codebase Retrieval

Hybrid retrieval that turns an error description into a ranked list of the
project files most likely responsible for it:
- **Lexical search** via the BM25 index, for exact tokens such as error codes
  and identifiers
- **Semantic search** via the vector index, for renamed or paraphrased code
- **Fusion by file**, keeping the best line range seen for each file

## Architecture

```text
Error text (+ best-guess file)
  ├─> BM25 search
  │     └─> Top-K chunk hits
  ├─> Query embedding ─> vector search
  │     └─> Top-K chunk hits
  └─> Fusion by file
        └─> Root-cause file + related files
```

Vector similarity ranks files; a normalized BM25 score is added with a small
weight so lexical hits break ties and still surface files the embedding
missed. When the query cannot be embedded, lexical hits are ranked alone.

## Example

```rust,no_run
use cloi_codebase_indexer::{IndexerConfig, ProjectIndex};
use cloi_codebase_retrieval::{HybridRetrieval, RetrievalConfig, RetrievalQuery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let index = ProjectIndex::new(IndexerConfig::for_project("."))?;
    let mut retrieval = HybridRetrieval::new(RetrievalConfig::default(), index)?;

    let query = RetrievalQuery::new("TypeError: Cannot read properties of undefined (reading 'id')")
        .with_best_guess("src/routes/users.js");
    let result = retrieval.search(&query).await?;

    for file in result.ranked_files() {
        if let Some(span) = result.span(file) {
            println!("{file}:{}-{} (score: {:.2})", span.start_line, span.end_line, span.score);
        }
    }

    retrieval.close().await?;
    Ok(())
}
```
*/

mod config;
mod error;
mod fusion;
mod result;
mod retrieval;

pub use config::RetrievalConfig;
pub use error::{Result, RetrievalError};
pub use fusion::{FusionEngine, RankedFile, shared_components};
pub use result::{FileSpan, RetrievalQuery, RetrievalResult, SearchSource, SearchStats};
pub use retrieval::{CacheStats, HybridRetrieval};
