/*!
# Cloi Codebase Indexer

Builds, persists and reloads the lexical and vector indices of one project.

## Features

- **Lazy loading**: indices are read from the state directory on first use
- **Self-healing**: absent, corrupt or outdated state triggers a rebuild from source
- **Gitignore-aware discovery**: `.gitignore` plus configurable ignore patterns
- **Partial-failure tolerant**: chunks whose embedding failed stay searchable lexically

## Example

```rust,no_run
use cloi_codebase_indexer::{IndexerConfig, ProjectIndex};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IndexerConfig::from_toml_file(Path::new("cloi.toml"))?;
    let mut index = ProjectIndex::new(config)?;

    if let Some(stats) = index.ensure_ready().await? {
        println!("Indexed {} files, created {} chunks",
            stats.files_processed, stats.chunks_created);
    }

    index.close().await?;
    Ok(())
}
```
*/

mod config;
mod error;
mod indexer;
mod state;

pub use config::IndexerConfig;
pub use error::{IndexerError, Result};
pub use indexer::{IndexStats, LEXICAL_INDEX_NAME, ProjectIndex, VECTOR_INDEX_NAME};
pub use state::{FileState, IndexState, StateDiff};
