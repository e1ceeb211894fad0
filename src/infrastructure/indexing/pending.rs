//! Buffered reindex requests, flushed by the embedding service's scheduler

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::domain::indexing::IndexResult;
use crate::domain::ingestion::Chunk;
use crate::domain::DomainError;

/// One queued reindex call
#[derive(Debug, Clone)]
pub struct PendingReindex {
    pub doc_id: String,
    pub raw_bytes: Vec<u8>,
    pub chunks: Vec<Chunk>,
    pub metadata: BTreeMap<String, String>,
}

impl PendingReindex {
    pub fn new(doc_id: impl Into<String>, raw_bytes: Vec<u8>, chunks: Vec<Chunk>) -> Self {
        Self {
            doc_id: doc_id.into(),
            raw_bytes,
            chunks,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of one flushed request
#[derive(Debug)]
pub struct FlushOutcome {
    pub doc_id: String,
    pub result: Result<IndexResult, DomainError>,
}

/// FIFO of reindex requests
///
/// Owns no timer; whoever schedules work hands the queue to
/// [`DocumentPipeline::flush_pending`](crate::DocumentPipeline::flush_pending).
#[derive(Debug, Default)]
pub struct PendingWrites {
    queue: Mutex<VecDeque<PendingReindex>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request, returning the queue length
    pub fn push(&self, request: PendingReindex) -> Result<usize, DomainError> {
        let mut queue = self.queue.lock().map_err(|e| {
            DomainError::storage(format!("Failed to acquire queue lock: {}", e))
        })?;

        queue.push_back(request);
        Ok(queue.len())
    }

    pub fn len(&self) -> Result<usize, DomainError> {
        let queue = self.queue.lock().map_err(|e| {
            DomainError::storage(format!("Failed to acquire queue lock: {}", e))
        })?;

        Ok(queue.len())
    }

    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }

    /// Take every queued request, oldest first
    pub fn drain(&self) -> Result<Vec<PendingReindex>, DomainError> {
        let mut queue = self.queue.lock().map_err(|e| {
            DomainError::storage(format!("Failed to acquire queue lock: {}", e))
        })?;

        Ok(queue.drain(..).collect())
    }
}
