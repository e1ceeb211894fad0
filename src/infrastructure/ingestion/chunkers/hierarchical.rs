//! Hierarchical chunking strategy: one or more chunks per section, breadcrumb-prefixed

use super::packing::{section_at, ChunkDraft, Span, SpanContext};
use crate::domain::ingestion::{ChunkingParams, ParsedDocument};
use crate::infrastructure::ingestion::references::incoming_reference_counts;

const PATH_SEPARATOR: &str = " > ";

/// Walk the section tree depth-first
///
/// A leaf section is always emitted as a complete unit, however short. A parent's own
/// text that is shorter than `min_chunk_size` is carried into the next emitted chunk.
/// Sections over `max_size` are packed at their internal boundaries; continuation
/// chunks repeat the breadcrumb and overlap with their predecessor.
pub(crate) fn chunk(
    ctx: &SpanContext<'_>,
    doc: &ParsedDocument,
    params: &ChunkingParams,
) -> Vec<ChunkDraft> {
    let tree = &doc.tree;
    let reference_counts = incoming_reference_counts(doc);
    let mut drafts: Vec<ChunkDraft> = Vec::new();
    let mut carried: Vec<Span> = Vec::new();

    for id in tree.depth_first() {
        let Some(section) = tree.get(id) else {
            continue;
        };

        let body = ctx.trim(section.content_start, section.content_end);
        if body.start >= body.end {
            continue;
        }

        let length = ctx.chars(body.start, body.end);
        if !section.is_leaf() && length < params.min_chunk_size {
            carried.push(body);
            continue;
        }

        let pieces = if length <= params.max_size {
            vec![body]
        } else {
            let packed = ctx.pack(body.start, body.end, params);
            ctx.merge_small(packed, params.min_chunk_size)
        };

        let path = tree.breadcrumb(id);
        let reference_count = reference_counts.get(&id).copied().unwrap_or(0);

        for (idx, piece) in pieces.iter().enumerate() {
            let start = idx
                .checked_sub(1)
                .and_then(|prev| ctx.overlap_start(pieces[prev], params.overlap))
                .unwrap_or(piece.start);
            let mut text = ctx.text[start..piece.end].trim().to_string();
            let mut chunk_start = start;

            if idx == 0 && !carried.is_empty() {
                chunk_start = carried[0].start;
                text = join_carried(ctx, &carried, &text);
                carried.clear();
            }

            drafts.push(ChunkDraft {
                text: with_breadcrumb(&path, idx > 0, &text),
                start: chunk_start,
                end: piece.end,
                heading_path: path.clone(),
                section: Some(id),
                continuation: idx > 0,
                reference_count,
            });
        }
    }

    if !carried.is_empty() {
        append_leftover(ctx, doc, &carried, &mut drafts);
    }

    drafts
}

fn join_carried(ctx: &SpanContext<'_>, carried: &[Span], body: &str) -> String {
    let mut parts: Vec<&str> = carried
        .iter()
        .map(|span| &ctx.text[span.start..span.end])
        .collect();
    parts.push(body);
    parts.join("\n\n")
}

/// Carried text with no later section to attach to joins the last chunk
fn append_leftover(
    ctx: &SpanContext<'_>,
    doc: &ParsedDocument,
    carried: &[Span],
    drafts: &mut Vec<ChunkDraft>,
) {
    let end = carried.last().map(|s| s.end).unwrap_or_default();

    match drafts.last_mut() {
        Some(last) => {
            let leftover = join_carried(ctx, carried, "");
            last.text = format!("{}\n\n{}", last.text, leftover.trim_end());
            last.end = last.end.max(end);
        }
        None => {
            let first = carried[0].start;
            let section = section_at(doc, first);
            let path = doc.tree.breadcrumb(section);
            let text = join_carried(ctx, carried, "").trim_end().to_string();

            drafts.push(ChunkDraft {
                text: with_breadcrumb(&path, false, &text),
                start: first,
                end,
                heading_path: path,
                section: Some(section),
                continuation: false,
                reference_count: 0,
            });
        }
    }
}

/// Prefix a chunk body with its breadcrumb
fn with_breadcrumb(path: &[String], continuation: bool, body: &str) -> String {
    if path.is_empty() {
        return body.to_string();
    }

    let breadcrumb = path.join(PATH_SEPARATOR);
    if continuation {
        format!("{} (continued)\n\n{}", breadcrumb, body)
    } else {
        format!("{}\n\n{}", breadcrumb, body)
    }
}
