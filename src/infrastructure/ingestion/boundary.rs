//! Boundary detection: scores every candidate split point of a document

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::parser::{is_list_item, is_thematic_break, split_lines};
use crate::domain::ingestion::{
    Boundary, BoundaryKind, ImportanceTable, ParsedDocument, SpecialBlock, SpecialBlockKind,
};
use crate::domain::DomainError;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？', '…'];
const CLOSING_PUNCTUATION: &[char] = &['"', '\'', '”', '’', ')', '」', '』', '）'];

/// Produces boundaries weighted by an [`ImportanceTable`]
#[derive(Debug, Clone, Default)]
pub struct BoundaryDetector {
    importance: ImportanceTable,
}

impl BoundaryDetector {
    pub fn new(importance: ImportanceTable) -> Self {
        Self { importance }
    }

    pub fn importance(&self) -> &ImportanceTable {
        &self.importance
    }

    /// Detect boundaries in raw text given its special blocks
    ///
    /// Headings are recognised from `#` lines only; use [`Self::detect_document`] when a
    /// parsed structure is available.
    pub fn detect(
        &self,
        text: &str,
        special_blocks: &[SpecialBlock],
    ) -> Result<Vec<Boundary>, DomainError> {
        self.detect_with_headings(text, special_blocks, &[])
    }

    /// Detect boundaries using the section starts of a parsed document as headings
    pub fn detect_document(
        &self,
        text: &str,
        doc: &ParsedDocument,
    ) -> Result<Vec<Boundary>, DomainError> {
        let headings: Vec<usize> = doc
            .tree
            .sections()
            .iter()
            .filter(|s| !s.is_root())
            .map(|s| s.start_offset)
            .collect();

        self.detect_with_headings(text, &doc.special_blocks, &headings)
    }

    fn detect_with_headings(
        &self,
        text: &str,
        blocks: &[SpecialBlock],
        heading_offsets: &[usize],
    ) -> Result<Vec<Boundary>, DomainError> {
        validate_blocks(text, blocks)?;

        let mut boundaries = Vec::new();
        self.line_boundaries(text, blocks, heading_offsets, &mut boundaries);
        self.sentence_boundaries(text, &mut boundaries);
        self.block_edges(blocks, &mut boundaries);

        boundaries.retain(|b| !is_suppressed(b, blocks));
        boundaries.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.importance.total_cmp(&a.importance))
        });
        boundaries.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.kind == b.kind);

        debug!(count = boundaries.len(), "Detected boundaries");

        Ok(boundaries)
    }

    fn boundary(&self, kind: BoundaryKind, start: usize, end: usize) -> Boundary {
        Boundary::new(kind, start, end, self.importance.weight(kind))
    }

    /// Weight of a paragraph gap made of `blank_lines` blank lines.
    ///
    /// Two or more blank lines make a full paragraph boundary. A single blank line is
    /// still a paragraph gap but ranks halfway between paragraph and sentence.
    fn paragraph_weight(&self, blank_lines: usize) -> f32 {
        let paragraph = self.importance.weight(BoundaryKind::Paragraph);
        if blank_lines >= 2 {
            paragraph
        } else {
            (paragraph + self.importance.weight(BoundaryKind::Sentence)) / 2.0
        }
    }

    fn line_boundaries(
        &self,
        text: &str,
        blocks: &[SpecialBlock],
        heading_offsets: &[usize],
        out: &mut Vec<Boundary>,
    ) {
        let lines = split_lines(text);
        let mut previous_content_end: Option<usize> = None;
        let mut blank_lines = 0usize;
        let mut previous_quote = false;

        for line in &lines {
            let content = line.text(text);
            let in_code = blocks.iter().any(|b| {
                b.kind != SpecialBlockKind::List
                    && line.start >= b.start_offset
                    && line.start < b.end_offset
            });

            if content.trim().is_empty() {
                if previous_content_end.is_some() {
                    blank_lines += 1;
                }
                continue;
            }

            if let Some(prev_end) = previous_content_end.filter(|_| blank_lines > 0) {
                out.push(Boundary::new(
                    BoundaryKind::Paragraph,
                    prev_end,
                    line.start,
                    self.paragraph_weight(blank_lines),
                ));
            }
            blank_lines = 0;
            previous_content_end = Some(line.end);

            for (offset, _) in content.match_indices('\x0c') {
                let pos = line.start + offset;
                out.push(self.boundary(BoundaryKind::SectionBreak, pos, pos + 1));
            }

            if in_code {
                previous_quote = false;
                continue;
            }

            let trimmed = content.trim_start();
            let is_heading = heading_offsets.binary_search(&line.start).is_ok()
                || (trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with([' ', '\t']));

            if is_heading {
                out.push(self.boundary(BoundaryKind::Heading, line.start, line.start));
            } else if is_thematic_break(content) {
                out.push(self.boundary(BoundaryKind::SectionBreak, line.start, line.next));
            } else if is_list_item(content) {
                out.push(self.boundary(BoundaryKind::ListItem, line.start, line.start));
            }

            let is_quote = trimmed.starts_with('>');
            if is_quote && !previous_quote {
                out.push(self.boundary(BoundaryKind::Quote, line.start, line.start));
            }
            previous_quote = is_quote;
        }
    }

    fn sentence_boundaries(&self, text: &str, out: &mut Vec<Boundary>) {
        for (idx, _) in text.split_sentence_bound_indices() {
            if idx == 0 {
                continue;
            }

            let before = text[..idx].trim_end();
            let stripped = before.trim_end_matches(CLOSING_PUNCTUATION);
            if !stripped.ends_with(SENTENCE_TERMINATORS) {
                continue;
            }

            // Sentence ends at the terminator, the next one starts after the whitespace
            out.push(self.boundary(BoundaryKind::Sentence, before.len(), idx));
        }
    }

    fn block_edges(&self, blocks: &[SpecialBlock], out: &mut Vec<Boundary>) {
        for block in blocks {
            let kind = match block.kind {
                SpecialBlockKind::Code => BoundaryKind::Code,
                SpecialBlockKind::Table => BoundaryKind::Table,
                SpecialBlockKind::List => BoundaryKind::ListItem,
            };

            out.push(self.boundary(kind, block.start_offset, block.start_offset));
            out.push(self.boundary(kind, block.end_offset, block.end_offset));
        }
    }
}

fn validate_blocks(text: &str, blocks: &[SpecialBlock]) -> Result<(), DomainError> {
    for block in blocks {
        if block.start_offset > block.end_offset
            || block.end_offset > text.len()
            || !text.is_char_boundary(block.start_offset)
            || !text.is_char_boundary(block.end_offset)
        {
            return Err(DomainError::boundary(format!(
                "special block {}..{} does not fit a text of {} bytes",
                block.start_offset,
                block.end_offset,
                text.len()
            )));
        }
    }

    Ok(())
}

/// Code and table interiors are never split points; inside lists only item starts are
fn is_suppressed(boundary: &Boundary, blocks: &[SpecialBlock]) -> bool {
    blocks.iter().any(|block| {
        let inside = block.strictly_contains(boundary.start) || block.strictly_contains(boundary.end);

        match block.kind {
            SpecialBlockKind::Code | SpecialBlockKind::Table => inside,
            SpecialBlockKind::List => inside && boundary.kind != BoundaryKind::ListItem,
        }
    })
}
