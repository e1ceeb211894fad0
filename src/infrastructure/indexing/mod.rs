//! Incremental indexing infrastructure
//!
//! This module provides:
//! - `IncrementalIndexer`, the diff-based reindex algorithm
//! - In-memory and file-backed stores
//! - A deterministic embedder for tests and previews
//! - `PendingWrites` for scheduler-driven batch flushing

pub mod embedder;
pub mod file_state_store;
pub mod in_memory;
pub mod incremental;
pub mod pending;

pub use embedder::HashEmbedder;
pub use file_state_store::FileStateStore;
pub use in_memory::{InMemoryIndexStore, InMemoryStateStore};
pub use incremental::{DEFAULT_CALL_TIMEOUT, DEFAULT_CHANGE_RATIO_THRESHOLD, IncrementalIndexer};
pub use pending::{FlushOutcome, PendingReindex, PendingWrites};
