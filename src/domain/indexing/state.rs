//! Persisted per-document state and reindex outcomes

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Durable record of what is indexed for one document
///
/// `chunk_hashes` and `index_entry_ids` are parallel lists: entry `i` holds the chunk with hash `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub doc_id: String,
    #[serde(default)]
    pub source_path: Option<String>,
    pub source_hash: String,
    pub chunk_hashes: Vec<String>,
    pub index_entry_ids: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub last_processed_at: DateTime<Utc>,
}

impl DocumentState {
    pub fn new(
        doc_id: impl Into<String>,
        source_hash: impl Into<String>,
        chunk_hashes: Vec<String>,
        index_entry_ids: Vec<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            source_path: metadata.get("source_path").cloned(),
            source_hash: source_hash.into(),
            chunk_hashes,
            index_entry_ids,
            metadata,
            last_processed_at: Utc::now(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_hashes.len()
    }

    /// Check the parallel-list invariant before persisting or after loading
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.chunk_hashes.len() != self.index_entry_ids.len() {
            return Err(DomainError::state_corruption(
                &self.doc_id,
                format!(
                    "{} chunk hashes but {} index entries",
                    self.chunk_hashes.len(),
                    self.index_entry_ids.len()
                ),
            ));
        }

        Ok(())
    }

    /// Serialize to the persisted JSON layout
    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::internal(format!("Failed to serialize state: {}", e)))
    }

    /// Deserialize and validate a persisted record
    pub fn from_json(doc_id: &str, json: &str) -> Result<Self, DomainError> {
        let state: Self = serde_json::from_str(json)
            .map_err(|e| DomainError::state_corruption(doc_id, e.to_string()))?;
        state.validate()?;
        Ok(state)
    }
}

/// What a reindex call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    New,
    Unchanged,
    Updated,
    Reprocessed,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Unchanged => "unchanged",
            Self::Updated => "updated",
            Self::Reprocessed => "reprocessed",
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one reindex call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    pub doc_id: String,
    pub status: IndexStatus,
    pub entries_added: usize,
    pub entries_removed: usize,
    pub entries_unchanged: usize,
}

impl IndexResult {
    pub fn new(doc_id: impl Into<String>, status: IndexStatus) -> Self {
        Self {
            doc_id: doc_id.into(),
            status,
            entries_added: 0,
            entries_removed: 0,
            entries_unchanged: 0,
        }
    }

    pub fn with_counts(mut self, added: usize, removed: usize, unchanged: usize) -> Self {
        self.entries_added = added;
        self.entries_removed = removed;
        self.entries_unchanged = unchanged;
        self
    }
}
