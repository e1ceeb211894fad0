//! Pipeline entry points: adaptive chunking, large-document processing and reindexing

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::indexing::{Embedder, IndexResult, IndexStore, StateStore};
use crate::domain::ingestion::reader::decode_utf8;
use crate::domain::ingestion::{
    Boundary, Chunk, ChunkingOverrides, ChunkingParams, ChunkingStrategy, DocumentFeatures,
    FormatHint, LargeDocumentOutcome, ParsedDocument, SectionId, StrategySelection,
    validate_unit_size,
};
use crate::domain::DomainError;
use crate::infrastructure::indexing::{FlushOutcome, IncrementalIndexer, PendingWrites};
use crate::infrastructure::ingestion::{
    BoundaryDetector, CancellationFlag, ChunkingEngine, DocumentFeatureAnalyzer,
    ParallelChunkProcessor, StructureParser, TieBreak, WindowWorker, rank_sections_by_references,
};

/// Features of a document and the parameters chosen for it
#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub features: DocumentFeatures,
    pub params: ChunkingParams,
    /// Sections ordered by incoming references, most referenced first
    pub ranked_sections: Vec<RankedSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSection {
    pub section_id: SectionId,
    pub title: String,
    pub reference_count: usize,
}

/// Parses, detects boundaries and chunks a single text
///
/// Parse and boundary failures are recovered here by chunking with fixed-size windows.
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    parser: StructureParser,
    detector: BoundaryDetector,
    engine: ChunkingEngine,
    base_params: ChunkingParams,
    strategy: StrategySelection,
    tie_break: TieBreak,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(
            StructureParser::new(),
            BoundaryDetector::default(),
            ChunkingParams::default(),
            StrategySelection::Auto,
        )
    }
}

impl DocumentChunker {
    pub fn new(
        parser: StructureParser,
        detector: BoundaryDetector,
        base_params: ChunkingParams,
        strategy: StrategySelection,
    ) -> Self {
        Self {
            parser,
            detector,
            engine: ChunkingEngine::new(),
            base_params,
            strategy,
            tie_break: TieBreak::default(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, DomainError> {
        config.validate()?;

        let parser = StructureParser::new().with_reference_extractor(config.reference_extractor()?);
        let detector = BoundaryDetector::new(config.importance_table()?);

        Ok(
            Self::new(parser, detector, config.chunking_params(), config.strategy)
                .with_tie_break(config.reference_tie_break),
        )
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn base_params(&self) -> &ChunkingParams {
        &self.base_params
    }

    /// Describe a document and pick its chunking parameters
    pub fn analyze(
        &self,
        text: &str,
        hint: FormatHint,
        overrides: Option<&ChunkingOverrides>,
    ) -> DocumentAnalysis {
        let parsed = self.parse(text, hint);
        let (features, params) = self.select(text, parsed.as_ref(), overrides);

        let ranked_sections = parsed
            .as_ref()
            .map(|doc| {
                rank_sections_by_references(doc, self.tie_break)
                    .into_iter()
                    .filter_map(|(id, count)| {
                        doc.tree.get(id).map(|section| RankedSection {
                            section_id: id,
                            title: section.title.clone(),
                            reference_count: count,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        DocumentAnalysis {
            features,
            params,
            ranked_sections,
        }
    }

    /// Chunk a document with adaptively chosen parameters
    ///
    /// Fails only when the effective parameters are invalid.
    pub fn analyze_and_chunk(
        &self,
        text: &str,
        hint: FormatHint,
        overrides: Option<&ChunkingOverrides>,
    ) -> Result<Vec<Chunk>, DomainError> {
        let parsed = self.parse(text, hint);
        let (_, params) = self.select(text, parsed.as_ref(), overrides);
        self.chunk_parsed(text, parsed.as_ref(), params)
    }

    /// Chunk with fixed parameters, skipping adaptive selection
    pub fn chunk_with_params(
        &self,
        text: &str,
        hint: FormatHint,
        params: ChunkingParams,
    ) -> Result<Vec<Chunk>, DomainError> {
        let parsed = self.parse(text, hint);
        self.chunk_parsed(text, parsed.as_ref(), params)
    }

    fn parse(&self, text: &str, hint: FormatHint) -> Option<ParsedDocument> {
        match self.parser.parse(text, hint) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "Structure parsing failed, falling back to fixed-size chunking");
                None
            }
        }
    }

    fn select(
        &self,
        text: &str,
        parsed: Option<&ParsedDocument>,
        overrides: Option<&ChunkingOverrides>,
    ) -> (DocumentFeatures, ChunkingParams) {
        let features = match parsed {
            Some(doc) => DocumentFeatureAnalyzer::features_of(text, doc),
            None => DocumentFeatures {
                parse_failed: true,
                ..DocumentFeatureAnalyzer::text_features(text)
            },
        };

        let params = match self.strategy.forced() {
            Some(strategy) if !features.parse_failed => {
                self.base_params.clone().with_strategy(strategy)
            }
            _ => DocumentFeatureAnalyzer::choose_params(&features, &self.base_params),
        };

        let params = match overrides {
            Some(overrides) => overrides.apply(params),
            None => params,
        };

        debug!(
            strategy = params.strategy.as_str(),
            target = params.target_size,
            max = params.max_size,
            "Selected chunking parameters"
        );

        (features, params)
    }

    fn chunk_parsed(
        &self,
        text: &str,
        parsed: Option<&ParsedDocument>,
        mut params: ChunkingParams,
    ) -> Result<Vec<Chunk>, DomainError> {
        let boundaries: Vec<Boundary> = match parsed {
            Some(doc) => match self.detector.detect_document(text, doc) {
                Ok(boundaries) => boundaries,
                Err(e) => {
                    warn!(error = %e, "Boundary detection failed, falling back to fixed-size chunking");
                    params.strategy = ChunkingStrategy::FixedSize;
                    Vec::new()
                }
            },
            None => {
                params.strategy = ChunkingStrategy::FixedSize;
                Vec::new()
            }
        };

        self.engine.chunk(text, parsed, &boundaries, &params)
    }
}

/// A document queued for batch chunking
#[derive(Debug, Clone)]
pub struct BatchDocument {
    pub text: String,
    pub hint: FormatHint,
}

impl BatchDocument {
    pub fn new(text: impl Into<String>, hint: FormatHint) -> Self {
        Self {
            text: text.into(),
            hint,
        }
    }
}

/// The pipeline exposed to the surrounding service
///
/// Serializes reindexing per `doc_id`; different documents proceed concurrently.
#[derive(Debug)]
pub struct DocumentPipeline {
    chunker: Arc<DocumentChunker>,
    processor: ParallelChunkProcessor,
    indexer: IncrementalIndexer,
    unit_size: usize,
    doc_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentPipeline {
    pub fn new(
        chunker: DocumentChunker,
        processor: ParallelChunkProcessor,
        indexer: IncrementalIndexer,
        unit_size: usize,
    ) -> Self {
        Self {
            chunker: Arc::new(chunker),
            processor,
            indexer,
            unit_size,
            doc_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn IndexStore>,
        state: Arc<dyn StateStore>,
    ) -> Result<Self, DomainError> {
        let chunker = DocumentChunker::from_config(config)?;
        let processor = ParallelChunkProcessor::new(config.worker_pool_size)
            .with_batch_concurrency(config.effective_batch_concurrency())
            .with_window_adjust_limit(config.window_adjust_limit);
        let indexer = IncrementalIndexer::new(embedder, index, state)
            .with_change_ratio_threshold(config.change_ratio_threshold)
            .with_call_timeout(config.call_timeout());

        Ok(Self::new(
            chunker,
            processor,
            indexer,
            config.large_document_unit_size,
        ))
    }

    pub fn chunker(&self) -> &DocumentChunker {
        &self.chunker
    }

    pub fn indexer(&self) -> &IncrementalIndexer {
        &self.indexer
    }

    pub fn analyze_and_chunk(
        &self,
        text: &str,
        hint: FormatHint,
        overrides: Option<&ChunkingOverrides>,
    ) -> Result<Vec<Chunk>, DomainError> {
        self.chunker.analyze_and_chunk(text, hint, overrides)
    }

    /// Chunk an oversized document in parallel windows
    ///
    /// Parameters are chosen once from the whole document and shared by every window.
    pub async fn process_large_document(
        &self,
        text: &str,
        unit_size: Option<usize>,
        hint: FormatHint,
        cancel: &CancellationFlag,
    ) -> Result<LargeDocumentOutcome, DomainError> {
        let unit_size = unit_size.unwrap_or(self.unit_size);
        validate_unit_size(unit_size)?;

        let params = self.chunker.analyze(text, hint, None).params;
        params.validate()?;

        let chunker = Arc::clone(&self.chunker);
        let worker: WindowWorker = Arc::new(move |window: &str, _: usize| {
            chunker.chunk_with_params(window, hint, params.clone())
        });

        let outcome = self
            .processor
            .process_large(text, unit_size, worker, cancel)
            .await?;

        if !outcome.is_complete() {
            warn!(
                failed = outcome.failed_windows.len(),
                total = outcome.windows_total,
                "Large document processed with missing windows"
            );
        }

        Ok(outcome)
    }

    /// Chunk many documents concurrently; result `i` belongs to `documents[i]`
    pub async fn process_batch(
        &self,
        documents: Vec<BatchDocument>,
        max_concurrency: Option<usize>,
    ) -> Vec<Result<Vec<Chunk>, DomainError>> {
        let chunker = Arc::clone(&self.chunker);

        self.processor
            .process_batch(
                documents,
                move |document: BatchDocument| {
                    let chunker = Arc::clone(&chunker);
                    async move {
                        tokio::task::spawn_blocking(move || {
                            chunker.analyze_and_chunk(&document.text, document.hint, None)
                        })
                        .await
                        .map_err(|e| DomainError::internal(format!("Chunking task failed: {}", e)))?
                    }
                },
                max_concurrency,
            )
            .await
    }

    /// Reindex a document, holding its per-document lock for the duration
    pub async fn reindex_document(
        &self,
        doc_id: &str,
        raw_bytes: &[u8],
        chunks: &[Chunk],
        metadata: BTreeMap<String, String>,
    ) -> Result<IndexResult, DomainError> {
        let lock = self.lock_for(doc_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.indexer
                .reindex(doc_id, raw_bytes, chunks, metadata)
                .await
        };
        self.release_lock(doc_id, lock)?;
        result
    }

    /// Remove a document from the index and drop its state
    pub async fn remove_document(&self, doc_id: &str) -> Result<usize, DomainError> {
        let lock = self.lock_for(doc_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.indexer.remove_document(doc_id).await
        };
        self.release_lock(doc_id, lock)?;
        result
    }

    /// Run every queued reindex request in order, one outcome per request
    ///
    /// Each request takes its document's lock, so a flush never interleaves with
    /// `reindex_document`, `ingest` or `remove_document` on the same document.
    pub async fn flush_pending(
        &self,
        pending: &PendingWrites,
    ) -> Result<Vec<FlushOutcome>, DomainError> {
        let requests = pending.drain()?;
        debug!(requests = requests.len(), "Flushing pending index writes");

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self
                .reindex_document(
                    &request.doc_id,
                    &request.raw_bytes,
                    &request.chunks,
                    request.metadata,
                )
                .await;
            outcomes.push(FlushOutcome {
                doc_id: request.doc_id,
                result,
            });
        }

        Ok(outcomes)
    }

    /// Decode, chunk and reindex raw document bytes
    ///
    /// Documents above the unit size go through the parallel processor. A large document
    /// with failed windows is not indexed, since its chunk list would be incomplete.
    pub async fn ingest(
        &self,
        doc_id: &str,
        raw_bytes: &[u8],
        hint: FormatHint,
        metadata: BTreeMap<String, String>,
    ) -> Result<IndexResult, DomainError> {
        let lock = self.lock_for(doc_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(doc_id, raw_bytes, hint, metadata).await
        };
        self.release_lock(doc_id, lock)?;
        result
    }

    async fn ingest_locked(
        &self,
        doc_id: &str,
        raw_bytes: &[u8],
        hint: FormatHint,
        metadata: BTreeMap<String, String>,
    ) -> Result<IndexResult, DomainError> {
        // Unchanged sources are answered from state without chunking
        if !self.indexer.needs_reindex(doc_id, raw_bytes).await? {
            return self.indexer.reindex(doc_id, raw_bytes, &[], metadata).await;
        }

        let text = decode_utf8(std::path::Path::new(doc_id), raw_bytes.to_vec())?;

        let chunks = if text.chars().count() > self.unit_size {
            let outcome = self
                .process_large_document(&text, None, hint, &CancellationFlag::new())
                .await?;
            if let Some(failure) = outcome.failed_windows.first() {
                return Err(DomainError::window(failure.window_index, failure.message.clone()));
            }
            outcome.chunks
        } else {
            self.analyze_and_chunk(&text, hint, None)?
        };

        info!(doc_id = %doc_id, chunks = chunks.len(), "Document chunked");
        self.indexer.reindex(doc_id, raw_bytes, &chunks, metadata).await
    }

    fn lock_for(&self, doc_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, DomainError> {
        let mut locks = self.doc_locks.lock().map_err(|e| {
            DomainError::internal(format!("Failed to acquire document lock table: {}", e))
        })?;

        Ok(Arc::clone(locks.entry(doc_id.to_string()).or_default()))
    }

    fn release_lock(
        &self,
        doc_id: &str,
        lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Result<(), DomainError> {
        let mut locks = self.doc_locks.lock().map_err(|e| {
            DomainError::internal(format!("Failed to acquire document lock table: {}", e))
        })?;

        // Only the table and this caller hold it: nobody is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(doc_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indexing::{IndexEntry, IndexStatus};
    use crate::domain::ingestion::ChunkMetadata;
    use crate::infrastructure::indexing::{
        HashEmbedder, InMemoryIndexStore, InMemoryStateStore, PendingReindex,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    fn pipeline() -> (DocumentPipeline, Arc<InMemoryIndexStore>) {
        let index = Arc::new(InMemoryIndexStore::new());
        let config = PipelineConfig {
            worker_pool_size: 4,
            large_document_unit_size: 2_000,
            ..PipelineConfig::default()
        };
        let pipeline = DocumentPipeline::from_config(
            &config,
            Arc::new(HashEmbedder::default()),
            index.clone(),
            Arc::new(InMemoryStateStore::new()),
        )
        .unwrap();
        (pipeline, index)
    }

    fn long_markdown(sections: usize) -> String {
        (0..sections)
            .map(|i| {
                format!(
                    "## Section {}\n\n{}\n",
                    i,
                    format!("Sentence {} of the body text goes here. ", i).repeat(12)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_hierarchical_example() {
        let chunker = DocumentChunker::default();
        let overrides = ChunkingOverrides::new()
            .with_strategy(ChunkingStrategy::Hierarchical)
            .with_target_size(1000);

        let chunks = chunker
            .analyze_and_chunk("A\n\n## B\nfoo\n\n## C\nbar", FormatHint::Markdown, Some(&overrides))
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, vec!["B".to_string()]);
        assert_eq!(chunks[1].heading_path, vec!["C".to_string()]);
        assert_eq!(chunks[0].ordinal_index, 0);
        assert_eq!(chunks[1].ordinal_index, 1);
    }

    #[test]
    fn test_parse_failure_falls_back_to_fixed_size() {
        let chunker = DocumentChunker::default();
        let text = format!("{}\0{}", "word ".repeat(300), "tail ".repeat(300));

        let chunks = chunker
            .analyze_and_chunk(&text, FormatHint::Generic, None)
            .unwrap();

        assert!(!chunks.is_empty());
        assert!(chunks
            .iter()
            .all(|c| c.metadata.strategy == ChunkingStrategy::FixedSize));
    }

    #[test]
    fn test_forced_strategy_is_used() {
        let config = PipelineConfig {
            strategy: StrategySelection::FixedSize,
            ..PipelineConfig::default()
        };
        let chunker = DocumentChunker::from_config(&config).unwrap();

        let chunks = chunker
            .analyze_and_chunk(&long_markdown(4), FormatHint::Markdown, None)
            .unwrap();
        assert!(chunks
            .iter()
            .all(|c| c.metadata.strategy == ChunkingStrategy::FixedSize));
    }

    #[test]
    fn test_analyze_ranks_referenced_sections() {
        let text = "# Intro\nRead [setup](#setup) and [setup](#setup).\n\n# Setup\nsteps\n\n# Usage\nBack to [intro](#intro).";
        let analysis = DocumentChunker::default().analyze(text, FormatHint::Markdown, None);

        assert_eq!(analysis.features.heading_count, 3);
        assert_eq!(analysis.params.strategy, ChunkingStrategy::Hierarchical);
        assert_eq!(analysis.ranked_sections[0].title, "Setup");
        assert_eq!(analysis.ranked_sections[0].reference_count, 2);
        assert_eq!(analysis.ranked_sections[1].title, "Intro");
    }

    #[tokio::test]
    async fn test_process_large_document_orders_chunks() {
        let (pipeline, _) = pipeline();
        let text = long_markdown(20);

        let outcome = pipeline
            .process_large_document(&text, Some(1_000), FormatHint::Markdown, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert!(outcome.windows_total > 1);
        let ordinals: Vec<u64> = outcome.chunks.iter().map(|c| c.ordinal_index).collect();
        let mut sorted = ordinals.clone();
        sorted.sort_unstable();
        assert_eq!(ordinals, sorted);
        assert!(outcome.chunks.iter().all(|c| c.metadata.window_index.is_some()));
    }

    #[tokio::test]
    async fn test_process_large_document_rejects_tiny_unit() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .process_large_document("text", Some(10), FormatHint::Generic, &CancellationFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_process_batch_preserves_order() {
        let (pipeline, _) = pipeline();
        let documents = vec![
            BatchDocument::new("# One\n\nfirst body", FormatHint::Markdown),
            BatchDocument::new("plain second document", FormatHint::Generic),
            BatchDocument::new("# Three\n\nthird body", FormatHint::Markdown),
        ];

        let results = pipeline.process_batch(documents, Some(2)).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap()[0].text.contains("first body"));
        assert!(results[1].as_ref().unwrap()[0].text.contains("second document"));
        assert!(results[2].as_ref().unwrap()[0].text.contains("third body"));
    }

    #[tokio::test]
    async fn test_ingest_then_unchanged() {
        let (pipeline, index) = pipeline();
        let raw = long_markdown(3).into_bytes();

        let first = pipeline
            .ingest("doc", &raw, FormatHint::Markdown, BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(first.status, IndexStatus::New);
        assert!(first.entries_added > 0);
        let stored = index.len().unwrap();

        let second = pipeline
            .ingest("doc", &raw, FormatHint::Markdown, BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(second.status, IndexStatus::Unchanged);
        assert_eq!(second.entries_unchanged, first.entries_added);
        assert_eq!(index.len().unwrap(), stored);
    }

    #[tokio::test]
    async fn test_concurrent_reindex_same_document_is_serialized() {
        let (pipeline, index) = pipeline();
        let pipeline = Arc::new(pipeline);
        let chunks = DocumentChunker::default()
            .analyze_and_chunk(&long_markdown(2), FormatHint::Markdown, None)
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let chunks = chunks.clone();
                tokio::spawn(async move {
                    pipeline
                        .reindex_document("doc", b"same", &chunks, BTreeMap::new())
                        .await
                })
            })
            .collect();

        let mut statuses = Vec::new();
        for handle in handles {
            statuses.push(handle.await.unwrap().unwrap().status);
        }

        assert_eq!(statuses.iter().filter(|s| **s == IndexStatus::New).count(), 1);
        assert_eq!(
            statuses.iter().filter(|s| **s == IndexStatus::Unchanged).count(),
            3
        );
        assert_eq!(index.len().unwrap(), chunks.len());
        assert!(pipeline.doc_locks.lock().unwrap().is_empty());
    }

    fn plain_chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Chunk::new(
                    *text,
                    i as u64,
                    Vec::new(),
                    None,
                    ChunkMetadata::new(ChunkingStrategy::FixedSize, 0, text.len()),
                )
            })
            .collect()
    }

    /// Index store whose writes yield to the scheduler before landing
    #[derive(Debug, Default)]
    struct SlowWriteIndexStore {
        inner: InMemoryIndexStore,
    }

    #[async_trait]
    impl IndexStore for SlowWriteIndexStore {
        async fn upsert(&self, entry: IndexEntry) -> Result<String, DomainError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.upsert(entry).await
        }

        async fn delete(&self, entry_id: &str) -> Result<bool, DomainError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.delete(entry_id).await
        }
    }

    #[tokio::test]
    async fn test_flush_pending_runs_each_request() {
        let (pipeline, index) = pipeline();
        let pending = PendingWrites::new();
        let metadata = BTreeMap::from([("source".to_string(), "queue".to_string())]);

        pending
            .push(
                PendingReindex::new("doc", b"v1".to_vec(), plain_chunks(&["one"]))
                    .with_metadata(metadata),
            )
            .unwrap();
        pending
            .push(PendingReindex::new("doc", b"v1".to_vec(), plain_chunks(&["one"])))
            .unwrap();
        pending
            .push(PendingReindex::new("", b"x".to_vec(), vec![]))
            .unwrap();

        let outcomes = pipeline.flush_pending(&pending).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result.as_ref().unwrap().status, IndexStatus::New);
        assert_eq!(
            outcomes[1].result.as_ref().unwrap().status,
            IndexStatus::Unchanged
        );
        assert!(outcomes[2].result.is_err());
        assert!(pending.is_empty().unwrap());
        assert!(pipeline.doc_locks.lock().unwrap().is_empty());

        let entry_id = &index.entry_ids_for("doc").unwrap()[0];
        let entry = index.get(entry_id).unwrap().unwrap();
        assert_eq!(entry.metadata.get("source").unwrap(), "queue");
    }

    #[tokio::test]
    async fn test_flush_empty_queue() {
        let (pipeline, _) = pipeline();
        let outcomes = pipeline.flush_pending(&PendingWrites::new()).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_flush_and_reindex_same_document_leave_index_consistent() {
        let index = Arc::new(SlowWriteIndexStore::default());
        let state = Arc::new(InMemoryStateStore::new());
        let pipeline = DocumentPipeline::from_config(
            &PipelineConfig::default(),
            Arc::new(HashEmbedder::default()),
            index.clone(),
            state.clone(),
        )
        .unwrap();

        let first = plain_chunks(&["alpha", "beta", "gamma", "delta"]);
        let second = plain_chunks(&["one", "two", "three", "four", "five"]);
        let pending = PendingWrites::new();
        pending
            .push(PendingReindex::new("doc", b"version two".to_vec(), second))
            .unwrap();

        let (direct, flushed) = tokio::join!(
            pipeline.reindex_document("doc", b"version one", &first, BTreeMap::new()),
            pipeline.flush_pending(&pending)
        );
        direct.unwrap();
        let flushed = flushed.unwrap();
        assert_eq!(flushed.len(), 1);
        assert!(flushed[0].result.is_ok());

        let saved = state.load("doc").await.unwrap().unwrap();
        let mut recorded = saved.index_entry_ids.clone();
        recorded.sort();
        let mut stored = index.inner.entry_ids_for("doc").unwrap();
        stored.sort();

        assert_eq!(recorded, stored);
        assert!(stored.len() == 4 || stored.len() == 5);
        assert!(pipeline.doc_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let (pipeline, index) = pipeline();
        pipeline
            .ingest("doc", b"# T\n\nbody text", FormatHint::Markdown, BTreeMap::new())
            .await
            .unwrap();

        assert!(pipeline.remove_document("doc").await.unwrap() > 0);
        assert!(index.is_empty().unwrap());
    }
}
