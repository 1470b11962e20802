//! # Cloi Lexical Index
//!
//! Term-overlap search over code chunks: a small tokenizer tuned for source
//! code and an inverted index scored with Okapi BM25.
//!
//! ```text
//! content ──> tokenize ──> term frequencies ──> postings (term -> [doc, tf])
//! query   ──> tokenize ──> Σ idf(t) · tf(k1+1) / (tf + k1(1 - b + b·len/avg))
//! ```
//!
//! The index persists as a single JSON document and reproduces identical
//! scores after a reload.
//!
//! ## Example
//!
//! ```
//! use cloi_lexical_index::{LexicalDocument, LexicalIndex};
//! use serde_json::json;
//!
//! let mut index = LexicalIndex::default();
//! index.add_document(LexicalDocument::new(
//!     "src/math.js:1-3",
//!     "function add(a, b) { return a + b; }",
//!     json!({ "file": "src/math.js" }),
//! ));
//!
//! let hits = index.search("add function", 5);
//! assert_eq!(hits[0].id, "src/math.js:1-3");
//! ```

mod error;
mod index;
mod tokenizer;

pub use error::{LexicalIndexError, Result};
pub use index::{
    Bm25Params, DuplicatePolicy, IndexStats, LexicalDocument, LexicalIndex, SearchHit,
};
pub use tokenizer::{STOPWORDS, TokenizerOptions, stem, tokenize};
