//! Diff-based incremental indexer
//!
//! Compares the chunk hashes of a new version of a document with the persisted
//! [`DocumentState`] and touches only the index entries whose content changed. State is
//! written last; a failed call leaves the previous state in place so the next attempt
//! recomputes the same diff.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::domain::indexing::{
    ChunkDiff, DocumentState, Embedder, IndexEntry, IndexResult, IndexStatus, IndexStore,
    SplicePlan, StateStore,
};
use crate::domain::ingestion::chunker::helpers::{content_hash, hash_bytes};
use crate::domain::ingestion::{Chunk, validate_document_id};
use crate::domain::DomainError;

pub const DEFAULT_CHANGE_RATIO_THRESHOLD: f64 = 0.5;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Re-indexes documents by chunk-hash diff
///
/// Callers must serialize `reindex` calls per `doc_id`.
#[derive(Debug, Clone)]
pub struct IncrementalIndexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn IndexStore>,
    state: Arc<dyn StateStore>,
    change_ratio_threshold: f64,
    call_timeout: Duration,
}

/// The writes one reindex call has to perform
struct WritePlan<'a> {
    chunks: &'a [Chunk],
    hashes: Vec<String>,
    slots: Vec<Option<String>>,
    stale: Vec<String>,
}

impl IncrementalIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn IndexStore>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            state,
            change_ratio_threshold: DEFAULT_CHANGE_RATIO_THRESHOLD,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_change_ratio_threshold(mut self, threshold: f64) -> Self {
        self.change_ratio_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn change_ratio_threshold(&self) -> f64 {
        self.change_ratio_threshold
    }

    /// Bring the index in line with a new version of a document
    pub async fn reindex(
        &self,
        doc_id: &str,
        raw_bytes: &[u8],
        chunks: &[Chunk],
        metadata: BTreeMap<String, String>,
    ) -> Result<IndexResult, DomainError> {
        validate_document_id(doc_id)?;

        let source_hash = hash_bytes(raw_bytes);
        let hashes: Vec<String> = chunks.iter().map(|c| content_hash(&c.text)).collect();

        let result = match self.load_state(doc_id).await? {
            None => {
                let plan = WritePlan {
                    chunks,
                    slots: vec![None; chunks.len()],
                    hashes,
                    stale: Vec::new(),
                };
                self.apply(doc_id, &source_hash, plan, metadata).await?;
                IndexResult::new(doc_id, IndexStatus::New).with_counts(chunks.len(), 0, 0)
            }
            Some(old) if old.source_hash == source_hash => {
                debug!(doc_id = %doc_id, "Source unchanged, skipping reindex");
                IndexResult::new(doc_id, IndexStatus::Unchanged).with_counts(
                    0,
                    0,
                    old.chunk_count(),
                )
            }
            Some(old) => {
                let diff = ChunkDiff::compute(&old.chunk_hashes, &hashes);

                if diff.exceeds(self.change_ratio_threshold) {
                    debug!(
                        doc_id = %doc_id,
                        changes = diff.change_count(),
                        old = diff.old_len,
                        new = diff.new_len,
                        "Change ratio above threshold, reprocessing document"
                    );
                    let removed = old.index_entry_ids.len();
                    let plan = WritePlan {
                        chunks,
                        slots: vec![None; chunks.len()],
                        hashes,
                        stale: old.index_entry_ids,
                    };
                    self.apply(doc_id, &source_hash, plan, metadata).await?;
                    IndexResult::new(doc_id, IndexStatus::Reprocessed).with_counts(
                        chunks.len(),
                        removed,
                        0,
                    )
                } else {
                    let splice = SplicePlan::build(&old.chunk_hashes, &old.index_entry_ids, &hashes);
                    let (added, removed, unchanged) =
                        (splice.to_insert(), splice.stale.len(), splice.reused());
                    let plan = WritePlan {
                        chunks,
                        hashes,
                        slots: splice.slots,
                        stale: splice.stale,
                    };
                    self.apply(doc_id, &source_hash, plan, metadata).await?;
                    IndexResult::new(doc_id, IndexStatus::Updated).with_counts(
                        added, removed, unchanged,
                    )
                }
            }
        };

        counter!("indexer_reindex_total", "status" => result.status.as_str()).increment(1);
        counter!("indexer_entries_added_total").increment(result.entries_added as u64);
        counter!("indexer_entries_removed_total").increment(result.entries_removed as u64);

        info!(
            doc_id = %doc_id,
            status = %result.status,
            added = result.entries_added,
            removed = result.entries_removed,
            unchanged = result.entries_unchanged,
            "Document reindexed"
        );

        Ok(result)
    }

    /// Remove every index entry of a document, then its state
    ///
    /// Returns the number of entries that existed in the index.
    pub async fn remove_document(&self, doc_id: &str) -> Result<usize, DomainError> {
        validate_document_id(doc_id)?;

        let Some(state) = self.load_state(doc_id).await? else {
            return Ok(0);
        };

        let mut deleted = Vec::with_capacity(state.index_entry_ids.len());
        let mut existing = 0;
        for entry_id in &state.index_entry_ids {
            match self.timed(self.index.delete(entry_id)).await {
                Ok(found) => {
                    existing += usize::from(found);
                    deleted.push(entry_id.clone());
                }
                Err(e) => {
                    return Err(Self::write_error(doc_id, e)
                        .with_entry_id(entry_id)
                        .with_deleted_entries(deleted));
                }
            }
        }

        self.timed(self.state.delete(doc_id)).await?;
        counter!("indexer_entries_removed_total").increment(deleted.len() as u64);
        info!(doc_id = %doc_id, entries = deleted.len(), "Document removed from index");

        Ok(existing)
    }

    /// Whether `raw_bytes` differ from the indexed version of the document
    pub async fn needs_reindex(&self, doc_id: &str, raw_bytes: &[u8]) -> Result<bool, DomainError> {
        Ok(match self.load_state(doc_id).await? {
            Some(state) => state.source_hash != hash_bytes(raw_bytes),
            None => true,
        })
    }

    /// Load prior state; a corrupt record counts as absent
    async fn load_state(&self, doc_id: &str) -> Result<Option<DocumentState>, DomainError> {
        match self.timed(self.state.load(doc_id)).await {
            Ok(state) => Ok(state),
            Err(DomainError::StateCorruption { message, .. }) => {
                warn!(doc_id = %doc_id, error = %message, "Corrupt document state, treating as absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Upsert, then delete, then persist state; roll back this call's upserts on failure
    async fn apply(
        &self,
        doc_id: &str,
        source_hash: &str,
        plan: WritePlan<'_>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), DomainError> {
        let mut inserted: Vec<String> = Vec::new();
        let mut entry_ids = Vec::with_capacity(plan.chunks.len());

        for ((chunk, hash), slot) in plan.chunks.iter().zip(&plan.hashes).zip(plan.slots) {
            let entry_id = match slot {
                Some(existing) => existing,
                None => match self.index_chunk(doc_id, chunk, hash, &metadata).await {
                    Ok(id) => {
                        inserted.push(id.clone());
                        id
                    }
                    Err(e) => {
                        let orphaned = self.rollback(doc_id, &inserted).await;
                        return Err(Self::with_orphans(doc_id, e, orphaned));
                    }
                },
            };
            entry_ids.push(entry_id);
        }

        let mut deleted = Vec::with_capacity(plan.stale.len());
        for entry_id in &plan.stale {
            if let Err(e) = self.timed(self.index.delete(entry_id)).await {
                let orphaned = self.rollback(doc_id, &inserted).await;
                return Err(Self::write_error(doc_id, e)
                    .with_entry_id(entry_id)
                    .with_deleted_entries(deleted)
                    .with_orphaned_entries(orphaned));
            }
            deleted.push(entry_id.clone());
        }

        let state = DocumentState::new(doc_id, source_hash, plan.hashes, entry_ids, metadata);
        if let Err(e) = self.timed(self.state.save(doc_id, &state)).await {
            let orphaned = self.rollback(doc_id, &inserted).await;
            return Err(Self::with_orphans(doc_id, e, orphaned));
        }

        Ok(())
    }

    async fn index_chunk(
        &self,
        doc_id: &str,
        chunk: &Chunk,
        hash: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, DomainError> {
        let context = |e: DomainError| {
            Self::write_error(doc_id, e).with_chunk_ordinal(chunk.ordinal_index)
        };

        let vector = self.timed(self.embedder.embed(&chunk.text)).await.map_err(context)?;
        let entry = IndexEntry::new(doc_id, vector, chunk.text.clone())
            .with_metadata(Self::entry_metadata(doc_id, chunk, hash, metadata));

        self.timed(self.index.upsert(entry)).await.map_err(context)
    }

    fn entry_metadata(
        doc_id: &str,
        chunk: &Chunk,
        hash: &str,
        metadata: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut entry = metadata.clone();
        entry.insert("doc_id".to_string(), doc_id.to_string());
        entry.insert("content_hash".to_string(), hash.to_string());
        entry.insert("ordinal_index".to_string(), chunk.ordinal_index.to_string());
        entry.insert("strategy".to_string(), chunk.metadata.strategy.as_str().to_string());
        if !chunk.heading_path.is_empty() {
            entry.insert("heading_path".to_string(), chunk.heading_path.join(" > "));
        }
        entry
    }

    /// Best effort removal of entries written by a failed call.
    ///
    /// Returns the ids whose delete failed; they remain in the index.
    async fn rollback(&self, doc_id: &str, inserted: &[String]) -> Vec<String> {
        let mut orphaned = Vec::new();
        if inserted.is_empty() {
            return orphaned;
        }

        warn!(doc_id = %doc_id, entries = inserted.len(), "Rolling back index writes");
        for entry_id in inserted {
            if let Err(e) = self.timed(self.index.delete(entry_id)).await {
                warn!(doc_id = %doc_id, entry_id = %entry_id, error = %e, "Rollback delete failed");
                orphaned.push(entry_id.clone());
            }
        }

        if !orphaned.is_empty() {
            warn!(doc_id = %doc_id, orphaned = orphaned.len(), "Rollback left entries in the index");
        }
        orphaned
    }

    /// Keep the original error unless the rollback left entries behind
    fn with_orphans(doc_id: &str, e: DomainError, orphaned: Vec<String>) -> DomainError {
        if orphaned.is_empty() {
            e
        } else {
            Self::write_error(doc_id, e).with_orphaned_entries(orphaned)
        }
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(DomainError::storage(format!(
                    "Call timed out after {:?}",
                    self.call_timeout
                )))
            })
    }

    fn write_error(doc_id: &str, e: DomainError) -> DomainError {
        match e {
            DomainError::IndexWrite { .. } => e,
            other => DomainError::index_write(doc_id, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indexing::{MockIndexStore, MockStateStore};
    use crate::domain::ingestion::{ChunkMetadata, ChunkingStrategy};
    use crate::infrastructure::indexing::{HashEmbedder, InMemoryIndexStore, InMemoryStateStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        index: Arc<InMemoryIndexStore>,
        state: Arc<InMemoryStateStore>,
        indexer: IncrementalIndexer,
    }

    fn fixture() -> Fixture {
        let index = Arc::new(InMemoryIndexStore::new());
        let state = Arc::new(InMemoryStateStore::new());
        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            index.clone(),
            state.clone(),
        );
        Fixture {
            index,
            state,
            indexer,
        }
    }

    fn chunks(texts: &[String]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Chunk::new(
                    text.clone(),
                    i as u64,
                    vec!["Doc".to_string()],
                    None,
                    ChunkMetadata::new(ChunkingStrategy::Semantic, 0, text.len()),
                )
            })
            .collect()
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk number {}", i)).collect()
    }

    fn raw(texts: &[String]) -> Vec<u8> {
        texts.join("\n\n").into_bytes()
    }

    #[tokio::test]
    async fn test_first_index_is_new() {
        let f = fixture();
        let t = texts(4);

        let result = f
            .indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::New);
        assert_eq!(result.entries_added, 4);
        assert_eq!(f.index.len().unwrap(), 4);

        let state = f.state.load("doc").await.unwrap().unwrap();
        assert_eq!(state.chunk_hashes.len(), 4);
        assert_eq!(state.index_entry_ids.len(), 4);
        assert_eq!(state.chunk_hashes[0], content_hash("chunk number 0"));
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let f = fixture();
        let t = texts(5);

        f.indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();
        let before = f.state.raw("doc").unwrap().unwrap();
        f.index.reset_counts();

        let result = f
            .indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::Unchanged);
        assert_eq!(result.entries_unchanged, 5);
        assert_eq!(f.state.raw("doc").unwrap().unwrap(), before);
        assert_eq!(f.index.upsert_count(), 0);
        assert_eq!(f.index.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_single_changed_chunk_is_updated() {
        let f = fixture();
        let old = texts(10);
        f.indexer
            .reindex("doc", &raw(&old), &chunks(&old), BTreeMap::new())
            .await
            .unwrap();
        let old_state = f.state.load("doc").await.unwrap().unwrap();
        f.index.reset_counts();

        let mut new = old.clone();
        new[5] = "chunk number five, rewritten".to_string();
        let result = f
            .indexer
            .reindex("doc", &raw(&new), &chunks(&new), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::Updated);
        assert_eq!(result.entries_added, 1);
        assert_eq!(result.entries_removed, 1);
        assert_eq!(result.entries_unchanged, 9);
        assert_eq!(f.index.upsert_count(), 1);
        assert_eq!(f.index.delete_count(), 1);

        let new_state = f.state.load("doc").await.unwrap().unwrap();
        for i in (0..10).filter(|i| *i != 5) {
            assert_eq!(new_state.index_entry_ids[i], old_state.index_entry_ids[i]);
        }
        assert_ne!(new_state.index_entry_ids[5], old_state.index_entry_ids[5]);
        assert!(f.index.get(&old_state.index_entry_ids[5]).unwrap().is_none());
        assert_eq!(f.index.len().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_large_change_reprocesses() {
        let f = fixture();
        let old = texts(10);
        f.indexer
            .reindex("doc", &raw(&old), &chunks(&old), BTreeMap::new())
            .await
            .unwrap();
        f.index.reset_counts();

        let new: Vec<String> = (0..8).map(|i| format!("fresh text {}", i)).collect();
        let result = f
            .indexer
            .reindex("doc", &raw(&new), &chunks(&new), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::Reprocessed);
        assert_eq!(f.index.delete_count(), 10);
        assert_eq!(f.index.upsert_count(), 8);
        assert_eq!(result.entries_removed, 10);
        assert_eq!(result.entries_added, 8);
        assert_eq!(f.index.len().unwrap(), 8);
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let index = Arc::new(InMemoryIndexStore::new());
        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            index.clone(),
            Arc::new(InMemoryStateStore::new()),
        )
        .with_change_ratio_threshold(0.05);

        let old = texts(10);
        indexer
            .reindex("doc", &raw(&old), &chunks(&old), BTreeMap::new())
            .await
            .unwrap();

        let mut new = old.clone();
        new[0] = "changed".to_string();
        let result = indexer
            .reindex("doc", &raw(&new), &chunks(&new), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::Reprocessed);
    }

    #[tokio::test]
    async fn test_reordered_duplicates_keep_entries() {
        let f = fixture();
        let old = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        f.indexer
            .reindex("doc", b"v1", &chunks(&old), BTreeMap::new())
            .await
            .unwrap();
        f.index.reset_counts();

        let new = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let result = f
            .indexer
            .reindex("doc", b"v2", &chunks(&new), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::Updated);
        assert_eq!(result.entries_unchanged, 3);
        assert_eq!(f.index.upsert_count(), 0);
        assert_eq!(f.index.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_state_forces_full_index() {
        let f = fixture();
        f.state.insert_raw("doc", "{\"broken\": true").unwrap();

        let t = texts(3);
        let result = f
            .indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(result.status, IndexStatus::New);
        assert!(f.state.load("doc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_metadata_is_persisted_and_attached() {
        let f = fixture();
        let t = texts(1);
        let metadata = BTreeMap::from([("source_path".to_string(), "docs/a.md".to_string())]);

        f.indexer
            .reindex("doc", &raw(&t), &chunks(&t), metadata)
            .await
            .unwrap();

        let state = f.state.load("doc").await.unwrap().unwrap();
        assert_eq!(state.source_path.as_deref(), Some("docs/a.md"));

        let entry = f.index.get(&state.index_entry_ids[0]).unwrap().unwrap();
        assert_eq!(entry.metadata.get("source_path").unwrap(), "docs/a.md");
        assert_eq!(entry.metadata.get("heading_path").unwrap(), "Doc");
        assert_eq!(entry.metadata.get("ordinal_index").unwrap(), "0");
    }

    #[tokio::test]
    async fn test_upsert_failure_rolls_back_and_keeps_state() {
        let upserts = Arc::new(AtomicUsize::new(0));
        let counter = upserts.clone();

        let mut index = MockIndexStore::new();
        index.expect_upsert().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                Err(DomainError::storage("index unavailable"))
            } else {
                Ok(format!("entry-{}", n))
            }
        });
        index
            .expect_delete()
            .times(2)
            .returning(|id| Ok(id.starts_with("entry-")));

        let mut state = MockStateStore::new();
        state.expect_load().returning(|_| Ok(None));
        state.expect_save().times(0);

        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(index),
            Arc::new(state),
        );

        let t = texts(5);
        let err = indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            DomainError::IndexWrite {
                doc_id,
                chunk_ordinal,
                cause,
                ..
            } => {
                assert_eq!(doc_id, "doc");
                assert_eq!(chunk_ordinal, Some(2));
                assert!(cause.contains("index unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_orphaned_entries() {
        let upserts = Arc::new(AtomicUsize::new(0));
        let counter = upserts.clone();

        let mut index = MockIndexStore::new();
        index.expect_upsert().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                Err(DomainError::storage("index unavailable"))
            } else {
                Ok(format!("entry-{}", n))
            }
        });
        index.expect_delete().times(2).returning(|id| {
            if id == "entry-0" {
                Err(DomainError::storage("delete refused"))
            } else {
                Ok(true)
            }
        });

        let mut state = MockStateStore::new();
        state.expect_load().returning(|_| Ok(None));
        state.expect_save().times(0);

        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(index),
            Arc::new(state),
        );

        let t = texts(4);
        let err = indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("orphaned: 1"));
        match err {
            DomainError::IndexWrite {
                chunk_ordinal,
                orphaned_entry_ids,
                ..
            } => {
                assert_eq!(chunk_ordinal, Some(2));
                assert_eq!(orphaned_entry_ids, vec!["entry-0".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_failure_reports_progress() {
        let f = fixture();
        let old = texts(4);
        f.indexer
            .reindex("doc", &raw(&old), &chunks(&old), BTreeMap::new())
            .await
            .unwrap();
        let old_state = f.state.raw("doc").unwrap().unwrap();
        let parsed = DocumentState::from_json("doc", &old_state).unwrap();

        let failing_id = parsed.index_entry_ids[3].clone();
        let mut index = MockIndexStore::new();
        index
            .expect_upsert()
            .returning(|_| Ok(uuid::Uuid::new_v4().to_string()));
        let target = failing_id.clone();
        index.expect_delete().returning(move |id| {
            if id == target {
                Err(DomainError::storage("delete refused"))
            } else {
                Ok(true)
            }
        });

        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(index),
            f.state.clone(),
        );

        let new: Vec<String> = (0..4).map(|i| format!("other {}", i)).collect();
        let err = indexer
            .reindex("doc", &raw(&new), &chunks(&new), BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            DomainError::IndexWrite {
                entry_id,
                deleted_entry_ids,
                ..
            } => {
                assert_eq!(entry_id, Some(failing_id));
                assert_eq!(deleted_entry_ids, parsed.index_entry_ids[..3].to_vec());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(f.state.raw("doc").unwrap().unwrap(), old_state);
    }

    #[tokio::test]
    async fn test_state_save_failure_rolls_back() {
        let index = Arc::new(InMemoryIndexStore::new());

        let mut state = MockStateStore::new();
        state.expect_load().returning(|_| Ok(None));
        state
            .expect_save()
            .returning(|_, _| Err(DomainError::storage("disk full")));

        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            index.clone(),
            Arc::new(state),
        );

        let t = texts(3);
        let err = indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Storage { .. }));
        assert!(index.is_empty().unwrap());
    }

    #[derive(Debug)]
    struct SlowIndexStore;

    #[async_trait]
    impl IndexStore for SlowIndexStore {
        async fn upsert(&self, _entry: IndexEntry) -> Result<String, DomainError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok("late".to_string())
        }

        async fn delete(&self, _entry_id: &str) -> Result<bool, DomainError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_call_timeout_maps_to_index_write() {
        let indexer = IncrementalIndexer::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(SlowIndexStore),
            Arc::new(InMemoryStateStore::new()),
        )
        .with_call_timeout(Duration::from_millis(20));

        let t = texts(1);
        let err = indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap_err();

        match err {
            DomainError::IndexWrite { cause, .. } => assert!(cause.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_document() {
        let f = fixture();
        let t = texts(3);
        f.indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(f.indexer.remove_document("doc").await.unwrap(), 3);
        assert!(f.index.is_empty().unwrap());
        assert!(f.state.raw("doc").unwrap().is_none());
        assert_eq!(f.indexer.remove_document("doc").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_needs_reindex() {
        let f = fixture();
        let t = texts(2);

        assert!(f.indexer.needs_reindex("doc", &raw(&t)).await.unwrap());
        f.indexer
            .reindex("doc", &raw(&t), &chunks(&t), BTreeMap::new())
            .await
            .unwrap();
        assert!(!f.indexer.needs_reindex("doc", &raw(&t)).await.unwrap());
        assert!(f.indexer.needs_reindex("doc", b"changed").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_empty_doc_id() {
        let f = fixture();
        let err = f
            .indexer
            .reindex("", b"x", &[], BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
