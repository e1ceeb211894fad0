//! Document ingestion domain types and traits
//!
//! This module provides:
//! - The parsed structure model (`SectionTree`, `SpecialBlock`, `Reference`)
//! - Boundaries and their importance weights
//! - `Chunk` value objects and `ChunkingParams`
//! - The `Reader` seam for raw text extraction

pub mod boundary;
pub mod chunker;
pub mod features;
pub mod pipeline;
pub mod reader;
pub mod structure;
pub mod validation;

// Re-export main types
pub use boundary::{Boundary, BoundaryKind, ImportanceTable};
pub use chunker::{Chunk, ChunkMetadata, ChunkingParams, ChunkingStrategy, LARGE_OFFSET};
pub use features::DocumentFeatures;
pub use pipeline::{
    ChunkingOverrides, FormatHint, LargeDocumentOutcome, StrategySelection, WindowFailure,
};
pub use reader::{ReadOutput, Reader};
pub use structure::{
    ParsedDocument, Reference, ReferenceKind, Section, SectionId, SectionTree, SourceLocation,
    SpecialBlock, SpecialBlockKind,
};
pub use validation::{
    detect_format_from_filename, detect_format_from_mime, validate_concurrency,
    validate_document_id, validate_unit_size,
};

// Re-export mocks for testing
#[cfg(test)]
pub use reader::MockReader;
