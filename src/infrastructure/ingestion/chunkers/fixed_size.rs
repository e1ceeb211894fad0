//! Fixed-size chunking strategy

use super::packing::{section_at, ChunkDraft, Span, SpanContext};
use crate::domain::ingestion::{ChunkingParams, ParsedDocument};
use crate::infrastructure::ingestion::references::incoming_reference_counts;

/// Character windows with `overlap` characters repeated between neighbours
///
/// Each window advances by `target_size - overlap` characters so that a chunk, overlap
/// included, stays close to `target_size`. Works without any parsed structure.
pub(crate) fn chunk(
    ctx: &SpanContext<'_>,
    doc: Option<&ParsedDocument>,
    params: &ChunkingParams,
) -> Vec<ChunkDraft> {
    let step = params.target_size.saturating_sub(params.overlap).max(1);
    let spans = ctx.windows(0, ctx.text.len(), step);
    let spans = ctx.merge_small(spans, params.min_chunk_size);

    drafts_with_overlap(ctx, doc, &spans, params.overlap)
}

/// Build drafts for flat spans, repeating the tail of each span at the start of the next
pub(crate) fn drafts_with_overlap(
    ctx: &SpanContext<'_>,
    doc: Option<&ParsedDocument>,
    spans: &[Span],
    overlap: usize,
) -> Vec<ChunkDraft> {
    let reference_counts = doc.map(incoming_reference_counts);

    spans
        .iter()
        .enumerate()
        .map(|(idx, span)| {
            let start = idx
                .checked_sub(1)
                .and_then(|prev| ctx.overlap_start(spans[prev], overlap))
                .unwrap_or(span.start);

            let section = doc.map(|d| section_at(d, span.start));
            let heading_path = match (doc, section) {
                (Some(d), Some(id)) => d.tree.breadcrumb(id),
                _ => Vec::new(),
            };
            let reference_count = match (&reference_counts, section) {
                (Some(counts), Some(id)) => counts.get(&id).copied().unwrap_or(0),
                _ => 0,
            };

            ChunkDraft {
                text: ctx.text[start..span.end].trim().to_string(),
                start,
                end: span.end,
                heading_path,
                section,
                continuation: false,
                reference_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ingestion::ChunkingStrategy;

    fn context(text: &str) -> SpanContext<'_> {
        SpanContext {
            text,
            boundaries: &[],
            blocks: &[],
        }
    }

    #[test]
    fn test_small_content_single_chunk() {
        let params = ChunkingParams::new(1000, 200, ChunkingStrategy::FixedSize);
        let drafts = chunk(&context("Hello, World!"), None, &params);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].text, "Hello, World!");
        assert!(drafts[0].heading_path.is_empty());
    }

    #[test]
    fn test_whitespace_only() {
        let params = ChunkingParams::default();
        assert!(chunk(&context("   \n\t  "), None, &params).is_empty());
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let text = "word ".repeat(100);
        let params = ChunkingParams::new(50, 10, ChunkingStrategy::FixedSize).with_min_chunk_size(5);
        let drafts = chunk(&context(&text), None, &params);

        assert!(drafts.len() > 1);
        for pair in drafts.windows(2) {
            assert!(pair[1].start < pair[0].end, "consecutive chunks should overlap");
            let repeated = &text[pair[1].start..pair[0].end];
            assert!(pair[0].text.ends_with(repeated.trim()));
        }
        for draft in &drafts {
            assert!(draft.text.chars().count() <= 50);
        }
    }

    #[test]
    fn test_covers_all_text() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let params = ChunkingParams::new(100, 0, ChunkingStrategy::FixedSize).with_min_chunk_size(10);
        let drafts = chunk(&context(&text), None, &params);

        let rebuilt = drafts
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(
            rebuilt.split_whitespace().count(),
            text.split_whitespace().count()
        );
    }
}
