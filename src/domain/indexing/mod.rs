//! Incremental indexing domain: persisted state, diffing and store seams

pub mod diff;
pub mod state;
pub mod store;

pub use diff::{ChunkDiff, SplicePlan};
pub use state::{DocumentState, IndexResult, IndexStatus};
pub use store::{Embedder, IndexEntry, IndexStore, StateStore};

#[cfg(test)]
pub use store::{MockEmbedder, MockIndexStore, MockStateStore};
