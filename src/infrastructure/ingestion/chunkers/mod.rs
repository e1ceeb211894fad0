//! Chunking strategy engine
//!
//! Strategies are a closed set dispatched through a single match in [`ChunkingEngine::chunk`].

mod fixed_size;
mod hierarchical;
mod packing;
mod semantic;

use metrics::counter;
use tracing::debug;

use crate::domain::ingestion::boundary::collapse_same_offset;
use crate::domain::ingestion::{
    Boundary, Chunk, ChunkMetadata, ChunkingParams, ChunkingStrategy, ParsedDocument,
};
use crate::domain::DomainError;

use packing::{ChunkDraft, SpanContext};

/// Turns a parsed document and its boundaries into ordered chunks
///
/// Stateless; safe to share between concurrent callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkingEngine;

impl ChunkingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Chunk `text` with the strategy named in `params`
    ///
    /// Hierarchical chunking without a parsed structure, and semantic chunking without
    /// boundaries, fall back to fixed-size windows. Ordinals start at 0 in emission order.
    pub fn chunk(
        &self,
        text: &str,
        doc: Option<&ParsedDocument>,
        boundaries: &[Boundary],
        params: &ChunkingParams,
    ) -> Result<Vec<Chunk>, DomainError> {
        params.validate()?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let collapsed = collapse_same_offset(boundaries);
        let ctx = SpanContext {
            text,
            boundaries: &collapsed,
            blocks: doc.map(|d| d.special_blocks.as_slice()).unwrap_or(&[]),
        };

        let (strategy, drafts) = match (params.strategy, doc) {
            (ChunkingStrategy::Hierarchical, Some(doc)) => (
                ChunkingStrategy::Hierarchical,
                hierarchical::chunk(&ctx, doc, params),
            ),
            (ChunkingStrategy::Semantic, doc) if !collapsed.is_empty() => {
                (ChunkingStrategy::Semantic, semantic::chunk(&ctx, doc, params))
            }
            (requested, doc) => {
                if requested != ChunkingStrategy::FixedSize {
                    debug!(
                        requested = requested.as_str(),
                        "Falling back to fixed-size chunking"
                    );
                }
                (ChunkingStrategy::FixedSize, fixed_size::chunk(&ctx, doc, params))
            }
        };

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .enumerate()
            .map(|(ordinal, draft)| into_chunk(draft, ordinal as u64, strategy))
            .collect();

        counter!("chunker_chunks_emitted_total", "strategy" => strategy.as_str())
            .increment(chunks.len() as u64);
        debug!(
            strategy = strategy.as_str(),
            chunks = chunks.len(),
            "Chunked document"
        );

        Ok(chunks)
    }
}

fn into_chunk(draft: ChunkDraft, ordinal: u64, strategy: ChunkingStrategy) -> Chunk {
    let metadata = ChunkMetadata::new(strategy, draft.start, draft.end)
        .continuation(draft.continuation)
        .with_reference_count(draft.reference_count);

    Chunk::new(
        draft.text,
        ordinal,
        draft.heading_path,
        draft.section,
        metadata,
    )
}
