//! Semantic chunking strategy: boundary-driven packing over the flat boundary list

use super::fixed_size::drafts_with_overlap;
use super::packing::{ChunkDraft, SpanContext};
use crate::domain::ingestion::{ChunkingParams, ParsedDocument};

/// Accumulate text until the next boundary would pass `target_size`, then close at the
/// most important boundary among the next `lookahead` ones (never past `max_size`)
pub(crate) fn chunk(
    ctx: &SpanContext<'_>,
    doc: Option<&ParsedDocument>,
    params: &ChunkingParams,
) -> Vec<ChunkDraft> {
    let spans = ctx.pack(0, ctx.text.len(), params);
    let spans = ctx.merge_small(spans, params.min_chunk_size);

    drafts_with_overlap(ctx, doc, &spans, params.overlap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ingestion::{ChunkingStrategy, FormatHint};
    use crate::domain::ingestion::boundary::collapse_same_offset;
    use crate::infrastructure::ingestion::{BoundaryDetector, StructureParser};

    fn run(text: &str, params: &ChunkingParams) -> Vec<ChunkDraft> {
        let doc = StructureParser::new()
            .parse(text, FormatHint::Markdown)
            .unwrap();
        let boundaries = collapse_same_offset(
            &BoundaryDetector::default()
                .detect_document(text, &doc)
                .unwrap(),
        );
        let ctx = SpanContext {
            text,
            boundaries: &boundaries,
            blocks: &doc.special_blocks,
        };
        chunk(&ctx, Some(&doc), params)
    }

    #[test]
    fn test_closes_before_heading() {
        let text = "Some opening words here. More words follow.\n\n# Next Topic\nBody of the next topic.";
        let params = ChunkingParams::new(40, 0, ChunkingStrategy::Semantic)
            .with_max_size(80)
            .with_min_chunk_size(5);
        let drafts = run(text, &params);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "Some opening words here. More words follow.");
        assert!(drafts[1].text.starts_with("# Next Topic"));
        assert_eq!(drafts[1].heading_path, vec!["Next Topic"]);
    }

    #[test]
    fn test_respects_max_size_outside_blocks() {
        let text = "Sentence number one is here. ".repeat(40);
        let params = ChunkingParams::new(100, 20, ChunkingStrategy::Semantic)
            .with_max_size(150)
            .with_min_chunk_size(10);
        let drafts = run(&text, &params);

        assert!(drafts.len() > 5);
        for draft in &drafts {
            assert!(draft.text.chars().count() <= 150 + 20);
        }
    }

    #[test]
    fn test_code_block_kept_whole() {
        let code = format!("```python\n{}```", "print('hello world')\n".repeat(10));
        let text = format!("{}\n\n{}\n\n{}", "Lead in sentence. ".repeat(5), code, "Trailing words. ".repeat(5));
        let params = ChunkingParams::new(60, 10, ChunkingStrategy::Semantic)
            .with_max_size(120)
            .with_min_chunk_size(5);
        let drafts = run(&text, &params);

        let holders: Vec<_> = drafts.iter().filter(|d| d.text.contains("```")).collect();
        assert!(!holders.is_empty());
        for draft in holders {
            assert!(draft.text.contains(&code), "fence torn in {:?}", draft.text);
        }
    }
}
