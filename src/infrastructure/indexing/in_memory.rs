//! In-memory index and state stores
//!
//! Useful for testing and development. Data is lost when the process terminates.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::indexing::{DocumentState, IndexEntry, IndexStore, StateStore};
use crate::domain::DomainError;

/// Thread-safe in-memory vector index
///
/// Counts every upsert and delete call so callers can observe how much work a reindex did.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    entries: RwLock<HashMap<String, IndexEntry>>,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entry_id: &str) -> Result<Option<IndexEntry>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.get(entry_id).cloned())
    }

    /// Number of entries currently stored
    pub fn len(&self) -> Result<usize, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }

    /// Ids of all entries belonging to a document
    pub fn entry_ids_for(&self, doc_id: &str) -> Result<Vec<String>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.doc_id == doc_id)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Reset the call counters, keeping the stored entries
    pub fn reset_counts(&self) {
        self.upserts.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn upsert(&self, entry: IndexEntry) -> Result<String, DomainError> {
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let entry_id = entry
            .entry_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        entries.insert(
            entry_id.clone(),
            IndexEntry {
                entry_id: Some(entry_id.clone()),
                ..entry
            },
        );
        self.upserts.fetch_add(1, Ordering::SeqCst);

        Ok(entry_id)
    }

    async fn delete(&self, entry_id: &str) -> Result<bool, DomainError> {
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(entries.remove(entry_id).is_some())
    }
}

/// Thread-safe in-memory state store
///
/// Records are kept as their serialized JSON, exactly as a durable store would hold them.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: RwLock<HashMap<String, String>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized record for a document
    pub fn raw(&self, doc_id: &str) -> Result<Option<String>, DomainError> {
        let records = self.records.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(records.get(doc_id).cloned())
    }

    /// Store a raw record without validation
    pub fn insert_raw(&self, doc_id: &str, json: impl Into<String>) -> Result<(), DomainError> {
        let mut records = self.records.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        records.insert(doc_id.to_string(), json.into());
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, doc_id: &str) -> Result<Option<DocumentState>, DomainError> {
        self.raw(doc_id)?
            .map(|json| DocumentState::from_json(doc_id, &json))
            .transpose()
    }

    async fn save(&self, doc_id: &str, state: &DocumentState) -> Result<bool, DomainError> {
        state.validate()?;
        let json = state.to_json()?;

        let mut records = self.records.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        records.insert(doc_id.to_string(), json);
        Ok(true)
    }

    async fn delete(&self, doc_id: &str) -> Result<bool, DomainError> {
        let mut records = self.records.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(records.remove(doc_id).is_some())
    }
}
