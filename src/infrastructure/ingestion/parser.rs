//! Line-oriented structure parser
//!
//! Builds the section arena with a stack of open section indices, detects fenced code,
//! pipe tables and list runs, and collects cross-references against the open section.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::references::{resolve_references, slugify, ReferenceExtractor};
use crate::domain::ingestion::{
    FormatHint, ParsedDocument, Section, SectionId, SectionTree, SpecialBlock, SpecialBlockKind,
};
use crate::domain::DomainError;

static ATX_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex"));

static SETEXT_UNDERLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(=+|-+)[ \t]*$").expect("valid regex"));

static HTML_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*<h([1-6])(?:\s[^>]*)?>(.*?)</h[1-6]>\s*$").expect("valid regex")
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

static NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3}(?:\.\d{1,3})+)\.?[ \t]+(\p{Lu}[^\n]{0,78})$").expect("valid regex")
});

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})[ \t]*([^`\s]*)").expect("valid regex"));

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])[ \t]+\S").expect("valid regex"));

static TABLE_DELIMITER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\|?\s*:?-{2,}:?\s*(?:\|\s*:?-{2,}:?\s*)*\|?\s*$").expect("valid regex")
});

static THEMATIC_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$").expect("valid regex"));

/// One line of the source with its byte range
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line {
    /// Offset of the first byte
    pub start: usize,
    /// Offset just past the content, before the line terminator
    pub end: usize,
    /// Offset of the next line
    pub next: usize,
}

impl Line {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_blank(&self, source: &str) -> bool {
        self.text(source).trim().is_empty()
    }
}

/// Split `text` into lines, keeping byte offsets
pub(crate) fn split_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            let end = if i > start && text.as_bytes()[i - 1] == b'\r' {
                i - 1
            } else {
                i
            };
            lines.push(Line {
                start,
                end,
                next: i + 1,
            });
            start = i + 1;
        }
    }

    if start < text.len() {
        lines.push(Line {
            start,
            end: text.len(),
            next: text.len(),
        });
    }

    lines
}

pub(crate) fn is_thematic_break(line: &str) -> bool {
    THEMATIC_BREAK.is_match(line)
}

pub(crate) fn is_list_item(line: &str) -> bool {
    LIST_ITEM.is_match(line)
}

fn is_indented(line: &str) -> bool {
    line.starts_with("  ") || line.starts_with('\t')
}

/// Byte ranges of fenced code blocks, unterminated fences running to the end
pub(crate) fn code_fence_ranges(text: &str) -> Vec<(usize, usize)> {
    let lines = split_lines(text);
    let mut roles = vec![LineRole::Text; lines.len()];

    scan_fences(text, &lines, &mut roles)
        .into_iter()
        .map(|b| (b.start_offset, b.end_offset))
        .collect()
}

/// A heading recognised during the scan
#[derive(Debug, Clone)]
struct HeadingLine {
    level: u8,
    title: String,
    start: usize,
    body_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRole {
    Text,
    Code,
    Heading,
}

/// Parses raw text into sections, special blocks and references
///
/// Holds no mutable state; one parser can serve many documents concurrently.
#[derive(Debug, Clone, Default)]
pub struct StructureParser {
    references: ReferenceExtractor,
}

impl StructureParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_extractor(mut self, extractor: ReferenceExtractor) -> Self {
        self.references = extractor;
        self
    }

    /// Parse a document
    ///
    /// Unterminated code fences are closed at end of document. Text that cannot be treated
    /// as a document at all (embedded NUL bytes) yields `DomainError::Parse`.
    pub fn parse(&self, text: &str, hint: FormatHint) -> Result<ParsedDocument, DomainError> {
        if text.contains('\0') {
            return Err(DomainError::parse("text contains NUL bytes"));
        }

        let lines = split_lines(text);
        let mut roles = vec![LineRole::Text; lines.len()];

        let mut blocks = scan_fences(text, &lines, &mut roles);
        let headings = scan_headings(text, &lines, &mut roles, hint);
        blocks.extend(scan_tables(text, &lines, &mut roles));
        blocks.extend(scan_lists(text, &lines, &roles));
        blocks.sort_by_key(|b| b.start_offset);

        let mut sections = build_sections(text, &headings);

        let raw = self
            .references
            .extract(text)
            .into_iter()
            .filter(|r| !blocks.iter().any(|b| is_code_at(b, r.offset)))
            .collect();

        let starts: Vec<usize> = sections.iter().map(|s| s.start_offset).collect();
        let section_at = |offset: usize| {
            let idx = starts.partition_point(|s| *s <= offset);
            SectionId(idx.saturating_sub(1))
        };

        let tree = SectionTree::from_arena(sections.clone());
        let references = resolve_references(raw, &tree, section_at);

        for (idx, reference) in references.iter().enumerate() {
            if let Some(section) = sections.get_mut(reference.source_location.section_id.0) {
                section.references.push(idx);
            }
        }

        debug!(
            sections = sections.len(),
            special_blocks = blocks.len(),
            references = references.len(),
            format = ?hint,
            "Parsed document structure"
        );

        Ok(ParsedDocument {
            tree: SectionTree::from_arena(sections),
            special_blocks: blocks,
            references,
        })
    }
}

fn is_code_at(block: &SpecialBlock, offset: usize) -> bool {
    block.kind == SpecialBlockKind::Code && offset >= block.start_offset && offset < block.end_offset
}

fn scan_fences(text: &str, lines: &[Line], roles: &mut [LineRole]) -> Vec<SpecialBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(char, usize, usize, Option<String>)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let content = line.text(text);

        if let Some((fence_char, fence_len, open_idx, language)) = &open {
            roles[idx] = LineRole::Code;
            let trimmed = content.trim();
            let closes = content.len() - content.trim_start().len() <= 3
                && trimmed.len() >= *fence_len
                && trimmed.chars().all(|c| c == *fence_char);

            if !closes {
                continue;
            }

            let opener = lines[*open_idx];
            blocks.push(SpecialBlock {
                kind: SpecialBlockKind::Code,
                start_offset: opener.start,
                end_offset: line.end,
                content: text[opener.next.min(line.start)..line.start]
                    .trim_end_matches(['\n', '\r'])
                    .to_string(),
                language: language.clone(),
                implicitly_closed: false,
            });
            open = None;
            continue;
        }

        if let Some(caps) = FENCE_OPEN.captures(content) {
            let marker = &caps[1];
            let fence_char = marker.chars().next().unwrap_or('`');
            let language = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty());

            roles[idx] = LineRole::Code;
            open = Some((fence_char, marker.len(), idx, language));
        }
    }

    if let Some((_, _, open_idx, language)) = open {
        let opener = lines[open_idx];
        debug!(offset = opener.start, "Closing unterminated code fence at end of document");

        blocks.push(SpecialBlock {
            kind: SpecialBlockKind::Code,
            start_offset: opener.start,
            end_offset: text.trim_end().len().max(opener.end),
            content: text[opener.next.min(text.len())..]
                .trim_end()
                .to_string(),
            language,
            implicitly_closed: true,
        });
    }

    blocks
}

fn scan_headings(
    text: &str,
    lines: &[Line],
    roles: &mut [LineRole],
    hint: FormatHint,
) -> Vec<HeadingLine> {
    let mut headings = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        if roles[idx] != LineRole::Text {
            idx += 1;
            continue;
        }

        let line = lines[idx];
        let content = line.text(text);

        if let Some((level, title)) = single_line_heading(content, hint) {
            roles[idx] = LineRole::Heading;
            headings.push(HeadingLine {
                level,
                title,
                start: line.start,
                body_start: line.next,
            });
            idx += 1;
            continue;
        }

        if let Some(level) = setext_level(text, lines, roles, idx) {
            roles[idx] = LineRole::Heading;
            roles[idx + 1] = LineRole::Heading;
            headings.push(HeadingLine {
                level,
                title: content.trim().to_string(),
                start: line.start,
                body_start: lines[idx + 1].next,
            });
            idx += 2;
            continue;
        }

        idx += 1;
    }

    headings
}

fn single_line_heading(content: &str, hint: FormatHint) -> Option<(u8, String)> {
    if let Some(caps) = ATX_HEADING.captures(content) {
        let title = caps[2].trim().to_string();
        if !title.is_empty() {
            return Some((caps[1].len() as u8, title));
        }
    }

    match hint {
        FormatHint::Html => HTML_HEADING.captures(content).and_then(|caps| {
            let level = caps[1].parse::<u8>().ok()?;
            let title = HTML_TAG.replace_all(&caps[2], "").trim().to_string();
            (!title.is_empty()).then_some((level, title))
        }),
        FormatHint::Generic => NUMBERED_HEADING.captures(content).and_then(|caps| {
            let title = caps[2].trim();
            if title.ends_with(['.', ',', ';', ':']) {
                return None;
            }
            let depth = caps[1].split('.').count().min(6) as u8;
            Some((depth, format!("{} {}", &caps[1], title)))
        }),
        FormatHint::Markdown => None,
    }
}

/// Level of a setext heading starting at `idx`, if the next line underlines it
fn setext_level(text: &str, lines: &[Line], roles: &[LineRole], idx: usize) -> Option<u8> {
    let next = lines.get(idx + 1)?;
    if roles[idx + 1] != LineRole::Text {
        return None;
    }

    let content = lines[idx].text(text);
    if content.trim().is_empty()
        || content.starts_with("    ")
        || is_list_item(content)
        || content.contains('|')
        || content.trim_start().starts_with('>')
        || is_thematic_break(content)
    {
        return None;
    }

    // Only a paragraph's first line can be a title
    if idx > 0 && !lines[idx - 1].is_blank(text) && roles[idx - 1] == LineRole::Text {
        return None;
    }

    let underline = SETEXT_UNDERLINE.captures(next.text(text))?;
    let marker = underline.get(1)?.as_str();
    if marker.len() < 3 {
        return None;
    }

    Some(if marker.starts_with('=') { 1 } else { 2 })
}

fn scan_tables(text: &str, lines: &[Line], roles: &mut [LineRole]) -> Vec<SpecialBlock> {
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let is_row = |i: usize| roles[i] == LineRole::Text && lines[i].text(text).contains('|');

        if !is_row(idx) {
            idx += 1;
            continue;
        }

        let first = idx;
        while idx < lines.len() && is_row(idx) {
            idx += 1;
        }
        let run = &lines[first..idx];

        let all_piped = run.iter().all(|l| l.text(text).trim_start().starts_with('|'));
        let has_delimiter = run.iter().any(|l| TABLE_DELIMITER.is_match(l.text(text)));

        if run.len() >= 2 && (all_piped || has_delimiter) {
            let start = run[0].start;
            let end = run[run.len() - 1].end;
            blocks.push(SpecialBlock {
                kind: SpecialBlockKind::Table,
                start_offset: start,
                end_offset: end,
                content: text[start..end].to_string(),
                language: None,
                implicitly_closed: false,
            });

            for role in &mut roles[first..idx] {
                *role = LineRole::Code;
            }
        }
    }

    blocks
}

fn scan_lists(text: &str, lines: &[Line], roles: &[LineRole]) -> Vec<SpecialBlock> {
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        if roles[idx] != LineRole::Text || !is_list_item(lines[idx].text(text)) {
            idx += 1;
            continue;
        }

        let first = idx;
        let mut last = idx;
        idx += 1;

        while idx < lines.len() && roles[idx] == LineRole::Text {
            let content = lines[idx].text(text);

            if is_list_item(content) || (!content.trim().is_empty() && is_indented(content)) {
                last = idx;
                idx += 1;
                continue;
            }

            // A single blank line inside a list is allowed when the list continues
            let continues = content.trim().is_empty()
                && lines.get(idx + 1).is_some_and(|next| {
                    let next_text = next.text(text);
                    roles[idx + 1] == LineRole::Text
                        && (is_list_item(next_text)
                            || (!next_text.trim().is_empty() && is_indented(next_text)))
                });

            if continues {
                idx += 1;
                continue;
            }

            break;
        }

        let start = lines[first].start;
        let end = lines[last].end;
        blocks.push(SpecialBlock {
            kind: SpecialBlockKind::List,
            start_offset: start,
            end_offset: end,
            content: text[start..end].to_string(),
            language: None,
            implicitly_closed: false,
        });
    }

    blocks
}

fn build_sections(text: &str, headings: &[HeadingLine]) -> Vec<Section> {
    let mut sections = vec![Section {
        id: SectionId::ROOT,
        level: 0,
        title: String::new(),
        anchor: String::new(),
        content: String::new(),
        start_offset: 0,
        end_offset: text.len(),
        content_start: 0,
        content_end: text.len(),
        parent: None,
        children: Vec::new(),
        references: Vec::new(),
    }];

    let mut stack: Vec<usize> = vec![0];
    let mut anchors: HashMap<String, usize> = HashMap::new();

    for heading in headings {
        // The previous section's own content stops at this heading
        if let Some(last) = sections.last_mut() {
            last.content_end = heading.start;
        }

        while stack.len() > 1 {
            let top = stack[stack.len() - 1];
            if sections[top].level < heading.level {
                break;
            }
            sections[top].end_offset = heading.start;
            stack.pop();
        }

        let parent = stack[stack.len() - 1];
        let id = sections.len();

        sections.push(Section {
            id: SectionId(id),
            level: heading.level,
            title: heading.title.clone(),
            anchor: unique_anchor(&heading.title, &mut anchors),
            content: String::new(),
            start_offset: heading.start,
            end_offset: text.len(),
            content_start: heading.body_start.min(text.len()),
            content_end: text.len(),
            parent: Some(SectionId(parent)),
            children: Vec::new(),
            references: Vec::new(),
        });
        sections[parent].children.push(SectionId(id));
        stack.push(id);
    }

    for section in &mut sections {
        section.content_end = section.content_end.max(section.content_start);
        section.content = text[section.content_start..section.content_end]
            .trim()
            .to_string();
    }

    sections
}

fn unique_anchor(title: &str, seen: &mut HashMap<String, usize>) -> String {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "section".to_string();
    }

    let count = seen.entry(base.clone()).or_insert(0);
    *count += 1;

    if *count == 1 {
        base
    } else {
        format!("{}-{}", base, count)
    }
}
