//! Document features used for adaptive parameter selection

use serde::{Deserialize, Serialize};

/// What a document looks like, as far as chunking is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFeatures {
    /// Size in characters
    pub estimated_size: usize,
    pub estimated_tokens: usize,
    pub has_table: bool,
    pub has_code: bool,
    pub has_list: bool,
    pub has_images: bool,
    /// Nesting depth of the heading tree
    pub structure_depth: usize,
    pub heading_count: usize,
    pub paragraph_count: usize,
    /// Structural parsing failed; only fixed-size chunking is safe
    pub parse_failed: bool,
}

impl DocumentFeatures {
    /// A document with no headings and no special blocks
    pub fn is_unstructured(&self) -> bool {
        self.heading_count == 0 && !self.has_code && !self.has_table
    }

    pub fn is_deeply_structured(&self) -> bool {
        self.structure_depth >= 3
    }
}
