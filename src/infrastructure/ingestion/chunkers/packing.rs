//! Span packing shared by the chunking strategies
//!
//! Strategies first choose contiguous, non-overlapping body spans; overlap is then
//! prepended from the tail of the previous span.

use crate::domain::ingestion::chunker::helpers;
use crate::domain::ingestion::{
    Boundary, ChunkingParams, ParsedDocument, SectionId, SpecialBlock, SpecialBlockKind,
};

/// Byte range `[start, end)` of the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Everything a strategy may consult while cutting
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpanContext<'a> {
    pub text: &'a str,
    /// Sorted, one boundary per offset
    pub boundaries: &'a [Boundary],
    pub blocks: &'a [SpecialBlock],
}

impl<'a> SpanContext<'a> {
    pub fn chars(&self, start: usize, end: usize) -> usize {
        helpers::char_len(&self.text[start..end])
    }

    /// First non-whitespace offset at or after `pos` (or the end of the text)
    pub fn skip_whitespace(&self, pos: usize) -> usize {
        let pos = pos.min(self.text.len());
        let rest = &self.text[pos..];
        pos + (rest.len() - rest.trim_start().len())
    }

    /// Shrink a range to its non-whitespace content
    pub fn trim(&self, start: usize, end: usize) -> Span {
        let slice = &self.text[start..end];
        let lead = slice.len() - slice.trim_start().len();
        let trail = slice.len() - slice.trim_end().len();

        if lead == slice.len() {
            return Span::new(end, end);
        }

        Span::new(start + lead, end - trail)
    }

    /// Code block or table strictly enclosing `pos`
    pub fn unsplittable_at(&self, pos: usize) -> Option<&'a SpecialBlock> {
        self.blocks.iter().find(|b| {
            matches!(b.kind, SpecialBlockKind::Code | SpecialBlockKind::Table)
                && b.strictly_contains(pos)
        })
    }

    /// Move a cut out of any code block or table it would tear
    pub fn safe_cut(&self, start: usize, pos: usize) -> usize {
        match self.unsplittable_at(pos) {
            Some(block) if block.start_offset > start => block.start_offset,
            Some(block) => block.end_offset,
            None => pos,
        }
    }

    /// Cut roughly `size` characters after `start`, on a word boundary when one is close
    pub fn forced_cut(&self, start: usize, hi: usize, size: usize) -> usize {
        let pos = helpers::advance_chars(self.text, start, size);
        if pos >= hi {
            return hi;
        }

        let word = helpers::find_word_boundary_before(self.text, pos);
        let cut = if word > start { word } else { pos };

        self.safe_cut(start, cut).min(hi)
    }

    /// Pack `[lo, hi)` into spans closing at the strongest boundary near `target_size`
    pub fn pack(&self, lo: usize, hi: usize, params: &ChunkingParams) -> Vec<Span> {
        let range = self.trim(lo, hi);
        let (mut start, hi) = (range.start, range.end);
        let candidates: Vec<&Boundary> = self
            .boundaries
            .iter()
            .filter(|b| b.start > start && b.start < hi)
            .collect();

        let mut spans = Vec::new();
        let mut next = 0;

        while start < hi {
            if self.chars(start, hi) <= params.target_size {
                spans.push(Span::new(start, hi));
                break;
            }

            while next < candidates.len() && candidates[next].start <= start {
                next += 1;
            }

            let mut last_fit = None;
            let mut probe = next;
            while probe < candidates.len()
                && self.chars(start, candidates[probe].start) <= params.target_size
            {
                last_fit = Some(probe);
                probe += 1;
            }

            // Look past the last fitting boundary for a stronger one, within max_size
            let from = last_fit.unwrap_or(probe);
            let to = (from + params.lookahead + 1).min(candidates.len());
            let chosen = (from..to)
                .filter(|j| self.chars(start, candidates[*j].start) <= params.max_size)
                .fold(None::<usize>, |best, j| match best {
                    Some(b) if candidates[b].importance >= candidates[j].importance => Some(b),
                    _ => Some(j),
                });

            match chosen {
                Some(j) => {
                    let boundary = candidates[j];
                    spans.push(Span::new(start, boundary.start));
                    start = self.skip_whitespace(boundary.end);
                    next = j + 1;
                }
                None => {
                    let cut = self.forced_cut(start, hi, params.target_size);
                    spans.push(Span::new(start, cut));
                    start = self.skip_whitespace(cut);
                }
            }
        }

        spans
            .into_iter()
            .map(|s| self.trim(s.start, s.end))
            .filter(|s| s.start < s.end)
            .collect()
    }

    /// Plain windows of `size` characters over `[lo, hi)`
    pub fn windows(&self, lo: usize, hi: usize, size: usize) -> Vec<Span> {
        let range = self.trim(lo, hi);
        let (mut start, hi) = (range.start, range.end);
        let mut spans = Vec::new();

        while start < hi {
            if self.chars(start, hi) <= size {
                spans.push(Span::new(start, hi));
                break;
            }

            let cut = self.forced_cut(start, hi, size);
            spans.push(self.trim(start, cut));
            start = self.skip_whitespace(cut);
        }

        spans.into_iter().filter(|s| s.start < s.end).collect()
    }

    /// Fold spans shorter than `min_chars` into a neighbour; a sole span is kept as is
    pub fn merge_small(&self, spans: Vec<Span>, min_chars: usize) -> Vec<Span> {
        if spans.len() <= 1 {
            return spans;
        }

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        let mut pending_start: Option<usize> = None;
        let mut last_end = 0;

        for mut span in spans {
            if let Some(start) = pending_start.take() {
                span.start = start;
            }
            last_end = span.end;

            if self.chars(span.start, span.end) >= min_chars {
                merged.push(span);
                continue;
            }

            match merged.last_mut() {
                Some(previous) => previous.end = span.end,
                None => pending_start = Some(span.start),
            }
        }

        if let Some(start) = pending_start {
            merged.push(Span::new(start, last_end));
        }

        merged
    }

    /// Where the next chunk starts when repeating the tail of `previous`
    ///
    /// Prefers the earliest sentence or paragraph start within the last `overlap`
    /// characters, then a word start; never starts inside a code block or table.
    pub fn overlap_start(&self, previous: Span, overlap: usize) -> Option<usize> {
        if overlap == 0 {
            return None;
        }

        let earliest = helpers::retreat_chars(self.text, previous.end, overlap).max(previous.start);

        let soft = self
            .boundaries
            .iter()
            .filter(|b| b.is_soft() && b.end >= earliest && b.end < previous.end)
            .map(|b| b.end)
            .min();

        let mut pos = soft.unwrap_or_else(|| {
            let at_word_start = earliest == previous.start
                || self.text[..earliest]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_whitespace);

            if at_word_start {
                earliest
            } else {
                helpers::find_word_boundary_after(self.text, earliest)
            }
        });

        if let Some(block) = self.unsplittable_at(pos) {
            pos = block.end_offset;
        }

        let pos = self.skip_whitespace(pos);
        (pos < previous.end && !self.text[pos..previous.end].trim().is_empty()).then_some(pos)
    }
}

/// Section whose own range contains `offset`
pub(crate) fn section_at(doc: &ParsedDocument, offset: usize) -> SectionId {
    let sections = doc.tree.sections();
    let idx = sections.partition_point(|s| s.start_offset <= offset);
    SectionId(idx.saturating_sub(1))
}

/// Chunk text and provenance before ordinals are assigned
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkDraft {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub heading_path: Vec<String>,
    pub section: Option<SectionId>,
    pub continuation: bool,
    pub reference_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ingestion::{BoundaryKind, ChunkingStrategy};

    fn ctx<'a>(text: &'a str, boundaries: &'a [Boundary], blocks: &'a [SpecialBlock]) -> SpanContext<'a> {
        SpanContext {
            text,
            boundaries,
            blocks,
        }
    }

    fn code_block(start: usize, end: usize) -> SpecialBlock {
        SpecialBlock {
            kind: SpecialBlockKind::Code,
            start_offset: start,
            end_offset: end,
            content: String::new(),
            language: None,
            implicitly_closed: false,
        }
    }

    #[test]
    fn test_windows_respect_words() {
        let text = "alpha beta gamma delta epsilon";
        let spans = ctx(text, &[], &[]).windows(0, text.len(), 12);

        let pieces: Vec<_> = spans.iter().map(|s| &text[s.start..s.end]).collect();
        assert_eq!(pieces, vec!["alpha beta", "gamma delta", "epsilon"]);
    }

    #[test]
    fn test_windows_hard_cut_without_spaces() {
        let text = "一二三四五六七八九十";
        let spans = ctx(text, &[], &[]).windows(0, text.len(), 4);
        let pieces: Vec<_> = spans.iter().map(|s| &text[s.start..s.end]).collect();
        assert_eq!(pieces, vec!["一二三四", "五六七八", "九十"]);
    }

    #[test]
    fn test_safe_cut_moves_out_of_block() {
        let text = "0123456789abcdefghij";
        let blocks = [code_block(5, 15)];
        let c = ctx(text, &[], &blocks);

        assert_eq!(c.safe_cut(0, 10), 5);
        assert_eq!(c.safe_cut(5, 10), 15);
        assert_eq!(c.safe_cut(0, 3), 3);
    }

    #[test]
    fn test_pack_prefers_stronger_boundary() {
        let text = "aaaa. bbbb. cccc\n\ndddd. eeee.";
        let boundaries = [
            Boundary::new(BoundaryKind::Sentence, 5, 6, 0.3),
            Boundary::new(BoundaryKind::Sentence, 11, 12, 0.3),
            Boundary::new(BoundaryKind::Paragraph, 16, 18, 0.5),
            Boundary::new(BoundaryKind::Sentence, 23, 24, 0.3),
        ];
        let params = ChunkingParams::new(12, 0, ChunkingStrategy::Semantic).with_max_size(20);
        let spans = ctx(text, &boundaries, &[]).pack(0, text.len(), &params);

        let pieces: Vec<_> = spans.iter().map(|s| &text[s.start..s.end]).collect();
        assert_eq!(pieces, vec!["aaaa. bbbb. cccc", "dddd. eeee."]);
    }

    #[test]
    fn test_merge_small() {
        let text = "ab cdefghij klmnopqrst u";
        let c = ctx(text, &[], &[]);
        let spans = vec![Span::new(0, 2), Span::new(3, 10), Span::new(11, 21), Span::new(22, 23)];
        let merged = c.merge_small(spans, 5);

        assert_eq!(merged, vec![Span::new(0, 10), Span::new(11, 23)]);
    }

    #[test]
    fn test_merge_small_all_tiny() {
        let text = "a b c";
        let c = ctx(text, &[], &[]);
        let merged = c.merge_small(vec![Span::new(0, 1), Span::new(2, 3), Span::new(4, 5)], 10);
        assert_eq!(merged, vec![Span::new(0, 5)]);
    }

    #[test]
    fn test_overlap_prefers_sentence_start() {
        let text = "First part here. Second sentence";
        let boundaries = [Boundary::new(BoundaryKind::Sentence, 16, 17, 0.3)];
        let c = ctx(text, &boundaries, &[]);

        let start = c.overlap_start(Span::new(0, text.len()), 20).unwrap();
        assert_eq!(&text[start..], "Second sentence");
    }

    #[test]
    fn test_overlap_falls_back_to_word() {
        let text = "one two three four";
        let c = ctx(text, &[], &[]);

        let start = c.overlap_start(Span::new(0, text.len()), 7).unwrap();
        assert_eq!(&text[start..], "four");
        assert_eq!(c.overlap_start(Span::new(0, text.len()), 0), None);
    }

    #[test]
    fn test_overlap_never_starts_inside_block() {
        let text = "intro ```code body``` tail";
        let blocks = [code_block(6, 21)];
        let c = ctx(text, &[], &blocks);

        let start = c.overlap_start(Span::new(0, text.len()), 10).unwrap();
        assert_eq!(&text[start..], "tail");
    }
}
