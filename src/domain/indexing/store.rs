//! Seams to the external embedder, vector index and state persistence

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state::DocumentState;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// One vector-index record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub doc_id: String,
    /// Existing entry to overwrite; `None` lets the store assign an id
    pub entry_id: Option<String>,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl IndexEntry {
    pub fn new(doc_id: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            entry_id: None,
            vector,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_entry_id(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = Some(entry_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Turns chunk text into a vector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Vector dimensionality
    fn dimensions(&self) -> usize;
}

/// Vector index the chunks are written to
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IndexStore: Send + Sync + Debug {
    /// Insert or replace an entry, returning its id
    async fn upsert(&self, entry: IndexEntry) -> Result<String, DomainError>;

    /// Delete an entry; `false` when it did not exist
    async fn delete(&self, entry_id: &str) -> Result<bool, DomainError>;
}

/// Durable key to JSON persistence of [`DocumentState`]
///
/// `save` replaces the record atomically or fails; a partial write is never observable.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync + Debug {
    /// Load the state for a document
    ///
    /// A record that fails to deserialize yields `DomainError::StateCorruption`.
    async fn load(&self, doc_id: &str) -> Result<Option<DocumentState>, DomainError>;

    async fn save(&self, doc_id: &str, state: &DocumentState) -> Result<bool, DomainError>;

    async fn delete(&self, doc_id: &str) -> Result<bool, DomainError>;
}
