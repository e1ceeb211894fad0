//! Chunk value objects, strategy selector and chunking parameters

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::structure::SectionId;
use crate::domain::DomainError;

/// Multiplier separating windows in parallel ordinals (`window * LARGE_OFFSET + local`)
pub const LARGE_OFFSET: u64 = 1_000_000;

/// Chunking algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Walk the section tree, one or more chunks per section
    Hierarchical,
    /// Pack text between boundaries, closing at the strongest nearby boundary
    #[default]
    Semantic,
    /// Character windows with overlap; the deterministic fallback
    FixedSize,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::Semantic => "semantic",
            Self::FixedSize => "fixed_size",
        }
    }
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hierarchical" => Ok(Self::Hierarchical),
            "semantic" => Ok(Self::Semantic),
            "fixed_size" | "fixed" => Ok(Self::FixedSize),
            other => Err(DomainError::validation(format!(
                "unknown chunking strategy '{}'",
                other
            ))),
        }
    }
}

/// Parameters for one chunking pass (sizes in characters)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingParams {
    pub target_size: usize,
    pub max_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
    pub strategy: ChunkingStrategy,
    /// How many boundaries the semantic strategy looks ahead when closing a chunk
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,
}

fn default_lookahead() -> usize {
    10
}

impl ChunkingParams {
    pub fn new(target_size: usize, overlap: usize, strategy: ChunkingStrategy) -> Self {
        Self {
            target_size,
            max_size: target_size * 2,
            overlap,
            min_chunk_size: 50.min(target_size),
            strategy,
            lookahead: default_lookahead(),
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_min_chunk_size(mut self, min_size: usize) -> Self {
        self.min_chunk_size = min_size;
        self
    }

    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Validate the parameters
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.target_size == 0 {
            return Err(DomainError::validation("target_size must be greater than 0"));
        }

        if self.max_size < self.target_size {
            return Err(DomainError::validation(
                "max_size must be greater than or equal to target_size",
            ));
        }

        if self.overlap >= self.target_size {
            return Err(DomainError::validation(
                "overlap must be less than target_size",
            ));
        }

        if self.min_chunk_size > self.target_size {
            return Err(DomainError::validation(
                "min_chunk_size must be less than or equal to target_size",
            ));
        }

        Ok(())
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            target_size: 1000,
            max_size: 2000,
            overlap: 200,
            min_chunk_size: 50,
            strategy: ChunkingStrategy::default(),
            lookahead: default_lookahead(),
        }
    }
}

/// Provenance details carried alongside a chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub strategy: ChunkingStrategy,
    /// Byte range of the chunk body within the source text
    pub start_offset: usize,
    pub end_offset: usize,
    /// Set on hierarchical pieces after the first one of a section
    #[serde(default)]
    pub is_continuation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_index: Option<usize>,
    /// Resolved references pointing at the source section
    #[serde(default)]
    pub reference_count: usize,
    pub token_estimate: usize,
}

impl ChunkMetadata {
    pub fn new(strategy: ChunkingStrategy, start_offset: usize, end_offset: usize) -> Self {
        Self {
            strategy,
            start_offset,
            end_offset,
            is_continuation: false,
            window_index: None,
            reference_count: 0,
            token_estimate: 0,
        }
    }

    pub fn continuation(mut self, is_continuation: bool) -> Self {
        self.is_continuation = is_continuation;
        self
    }

    pub fn with_reference_count(mut self, count: usize) -> Self {
        self.reference_count = count;
        self
    }
}

/// The unit handed to the embedder
///
/// Chunks are never mutated after creation; re-labelling produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub ordinal_index: u64,
    pub heading_path: Vec<String>,
    pub source_section_id: Option<SectionId>,
    pub content_hash: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a chunk, hashing its text
    pub fn new(
        text: impl Into<String>,
        ordinal_index: u64,
        heading_path: Vec<String>,
        source_section_id: Option<SectionId>,
        mut metadata: ChunkMetadata,
    ) -> Self {
        let text = text.into();
        metadata.token_estimate = helpers::estimate_tokens(&text);

        Self {
            content_hash: helpers::content_hash(&text),
            text,
            ordinal_index,
            heading_path,
            source_section_id,
            metadata,
        }
    }

    /// Same chunk under a new ordinal, tagged with the window that produced it
    pub fn relabelled(self, ordinal_index: u64, window_index: usize, offset_shift: usize) -> Self {
        let mut metadata = self.metadata;
        metadata.window_index = Some(window_index);
        metadata.start_offset += offset_shift;
        metadata.end_offset += offset_shift;

        Self {
            ordinal_index,
            metadata,
            ..self
        }
    }

    /// Length of the text in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Helper functions for chunking
pub mod helpers {
    use super::*;

    /// Lowercase hex SHA-256 of a chunk's exact text
    pub fn content_hash(text: &str) -> String {
        hash_bytes(text.as_bytes())
    }

    /// Lowercase hex SHA-256 of raw bytes
    pub fn hash_bytes(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Rough token count (four characters per token)
    pub fn estimate_tokens(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Number of characters in `text`
    pub fn char_len(text: &str) -> usize {
        text.chars().count()
    }

    /// Byte offset reached by advancing `chars` characters from `start`
    pub fn advance_chars(text: &str, start: usize, chars: usize) -> usize {
        if start >= text.len() {
            return text.len();
        }

        text[start..]
            .char_indices()
            .nth(chars)
            .map(|(i, _)| start + i)
            .unwrap_or(text.len())
    }

    /// Byte offset reached by stepping back `chars` characters from `end`
    pub fn retreat_chars(text: &str, end: usize, chars: usize) -> usize {
        let end = end.min(text.len());

        if chars == 0 {
            return end;
        }

        text[..end]
            .char_indices()
            .rev()
            .nth(chars - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Find the nearest word boundary at or before a position
    pub fn find_word_boundary_before(text: &str, pos: usize) -> usize {
        if pos >= text.len() {
            return text.len();
        }

        let mut boundary = floor_char_boundary(text, pos);

        while boundary > 0 {
            let prev = text[..boundary].chars().next_back();
            if prev.is_some_and(char::is_whitespace) {
                break;
            }
            boundary -= prev.map(char::len_utf8).unwrap_or(1);
        }

        if boundary == 0 {
            floor_char_boundary(text, pos)
        } else {
            boundary
        }
    }

    /// Find the nearest word boundary at or after a position
    pub fn find_word_boundary_after(text: &str, pos: usize) -> usize {
        if pos >= text.len() {
            return text.len();
        }

        let start = floor_char_boundary(text, pos);
        text[start..]
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, _)| start + i)
            .unwrap_or(text.len())
    }

    /// Largest char boundary not after `pos`
    pub fn floor_char_boundary(text: &str, pos: usize) -> usize {
        let mut pos = pos.min(text.len());
        while !text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }
}
