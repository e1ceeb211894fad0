//! PMP Chunk Indexer
//!
//! Structure-aware document chunking with diff-based incremental re-indexing:
//! - Markdown, HTML and plain text readers
//! - Section trees, special blocks and cross-reference resolution
//! - Hierarchical, semantic and fixed-size chunking with adaptive selection
//! - Parallel window processing for oversized documents
//! - Incremental reindexing against pluggable embedder, index and state stores

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::DomainError;
pub use infrastructure::services::{DocumentChunker, DocumentPipeline};
