//! Pipeline-level input types: format hints, strategy selection and overrides

use serde::{Deserialize, Serialize};

use super::chunker::{Chunk, ChunkingParams, ChunkingStrategy};
use crate::domain::DomainError;

/// How the raw text is marked up
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    Markdown,
    Html,
    #[default]
    Generic,
}

impl FormatHint {
    pub const ALL: [FormatHint; 3] = [Self::Markdown, Self::Html, Self::Generic];

    /// Get file extensions associated with this hint
    pub fn extensions(&self) -> &[&str] {
        match self {
            Self::Markdown => &["md", "markdown"],
            Self::Html => &["html", "htm"],
            Self::Generic => &["txt", "text"],
        }
    }

    /// Get MIME types associated with this hint
    pub fn mime_types(&self) -> &[&str] {
        match self {
            Self::Markdown => &["text/markdown", "text/x-markdown"],
            Self::Html => &["text/html"],
            Self::Generic => &["text/plain"],
        }
    }
}

impl std::str::FromStr for FormatHint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" | "htm" => Ok(Self::Html),
            "generic" | "text" | "plain" => Ok(Self::Generic),
            other => Err(DomainError::validation(format!(
                "unknown format hint '{}'",
                other
            ))),
        }
    }
}

/// Strategy as configured: a fixed choice or adaptive selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategySelection {
    #[default]
    Auto,
    Hierarchical,
    Semantic,
    FixedSize,
}

impl StrategySelection {
    /// The forced strategy, or `None` when the analyzer decides
    pub fn forced(&self) -> Option<ChunkingStrategy> {
        match self {
            Self::Auto => None,
            Self::Hierarchical => Some(ChunkingStrategy::Hierarchical),
            Self::Semantic => Some(ChunkingStrategy::Semantic),
            Self::FixedSize => Some(ChunkingStrategy::FixedSize),
        }
    }
}

/// Per-call overrides applied on top of adaptively chosen parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ChunkingStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chunk_size: Option<usize>,
}

impl ChunkingOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_target_size(mut self, size: usize) -> Self {
        self.target_size = Some(size);
        self
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = Some(size);
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self
    }

    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = Some(size);
        self
    }

    /// Apply the overrides, keeping `max_size >= target_size`
    pub fn apply(&self, mut params: ChunkingParams) -> ChunkingParams {
        if let Some(strategy) = self.strategy {
            params.strategy = strategy;
        }

        if let Some(target) = self.target_size {
            params.target_size = target;
            if self.max_size.is_none() && params.max_size < target {
                params.max_size = target * 2;
            }
        }

        if let Some(max) = self.max_size {
            params.max_size = max;
        }

        if let Some(overlap) = self.overlap {
            params.overlap = overlap;
        } else if params.overlap >= params.target_size {
            params.overlap = params.target_size / 5;
        }

        if let Some(min) = self.min_chunk_size {
            params.min_chunk_size = min;
        } else if params.min_chunk_size > params.target_size {
            params.min_chunk_size = params.target_size;
        }

        params
    }
}

/// A window that failed during parallel processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowFailure {
    pub window_index: usize,
    pub message: String,
}

/// Outcome of chunking an oversized document in parallel windows
///
/// Best-effort: chunks of failed windows are missing and listed in `failed_windows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeDocumentOutcome {
    pub chunks: Vec<Chunk>,
    pub windows_total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_windows: Vec<WindowFailure>,
}

impl LargeDocumentOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_windows.is_empty()
    }
}
