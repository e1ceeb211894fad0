//! Parsed document structure: an arena of sections plus special blocks and references

use serde::{Deserialize, Serialize};

/// Index of a section inside a [`SectionTree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(pub usize);

impl SectionId {
    /// The document root is always the first arena slot
    pub const ROOT: SectionId = SectionId(0);
}

/// A node of the structure tree
///
/// `level` 0 is the document root, 1..=6 are heading depths. `content` holds only
/// the section's own text (between its heading and the next heading of any level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub level: u8,
    pub title: String,
    /// Generated heading id (slug), unique within the document
    pub anchor: String,
    pub content: String,
    /// Offset of the heading line (or 0 for the root)
    pub start_offset: usize,
    /// End of the section including all of its subsections
    pub end_offset: usize,
    /// Byte range of `content` within the raw text
    pub content_start: usize,
    pub content_end: usize,
    pub parent: Option<SectionId>,
    pub children: Vec<SectionId>,
    /// Indices into [`ParsedDocument::references`]
    pub references: Vec<usize>,
}

impl Section {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of sections addressed by [`SectionId`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTree {
    sections: Vec<Section>,
}

impl SectionTree {
    /// Build a tree from an arena whose first element is the root
    pub fn from_arena(sections: Vec<Section>) -> Self {
        debug_assert!(sections.first().is_some_and(Section::is_root));
        Self { sections }
    }

    pub fn root(&self) -> &Section {
        &self.sections[0]
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Number of headed sections (everything except the root)
    pub fn heading_count(&self) -> usize {
        self.sections.len().saturating_sub(1)
    }

    /// Ancestor titles from the outermost heading down to `id` itself
    pub fn breadcrumb(&self, id: SectionId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self.get(id);

        while let Some(section) = current {
            if section.is_root() {
                break;
            }
            path.push(section.title.clone());
            current = section.parent.and_then(|p| self.get(p));
        }

        path.reverse();
        path
    }

    /// Maximum nesting depth below the root (0 for a heading-less document)
    pub fn depth(&self) -> usize {
        fn walk(tree: &SectionTree, id: SectionId) -> usize {
            tree.get(id)
                .map(|s| {
                    s.children
                        .iter()
                        .map(|c| 1 + walk(tree, *c))
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0)
        }

        walk(self, SectionId::ROOT)
    }

    /// Section ids in depth-first (document) order, root first
    pub fn depth_first(&self) -> Vec<SectionId> {
        let mut order = Vec::with_capacity(self.sections.len());
        let mut stack = vec![SectionId::ROOT];

        while let Some(id) = stack.pop() {
            order.push(id);

            if let Some(section) = self.get(id) {
                stack.extend(section.children.iter().rev().copied());
            }
        }

        order
    }
}

/// Kind of block that must never be split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialBlockKind {
    Code,
    Table,
    List,
}

/// A code block, table or list detected in the raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialBlock {
    pub kind: SpecialBlockKind,
    pub start_offset: usize,
    pub end_offset: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// True when the block ran to end-of-document without a closing marker
    #[serde(default)]
    pub implicitly_closed: bool,
}

impl SpecialBlock {
    /// Whether `offset` lies strictly between the block's edges
    pub fn strictly_contains(&self, offset: usize) -> bool {
        offset > self.start_offset && offset < self.end_offset
    }

    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// How a cross-reference was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `[text](target)`
    Link,
    /// `[[target]]`
    Bracket,
    /// Free-text "see also" phrase
    SeeAlso,
}

/// Where a reference was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub offset: usize,
    pub section_id: SectionId,
    pub section_title: String,
}

/// A cross-reference; unresolved references are kept with `resolved == false`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub source_location: SourceLocation,
    pub target_text: String,
    pub target_section_id: Option<SectionId>,
    pub resolved: bool,
}

/// Result of parsing one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub tree: SectionTree,
    pub special_blocks: Vec<SpecialBlock>,
    pub references: Vec<Reference>,
}

impl ParsedDocument {
    pub fn root(&self) -> &Section {
        self.tree.root()
    }

    pub fn unresolved_references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| !r.resolved)
    }
}
