//! Domain layer - Core types, seams and errors of the chunking pipeline

pub mod error;
pub mod indexing;
pub mod ingestion;

pub use error::{DomainError, ReaderError};
pub use indexing::{
    ChunkDiff, DocumentState, Embedder, IndexEntry, IndexResult, IndexStatus, IndexStore,
    SplicePlan, StateStore,
};
pub use ingestion::{
    Boundary, BoundaryKind, Chunk, ChunkMetadata, ChunkingOverrides, ChunkingParams,
    ChunkingStrategy, DocumentFeatures, FormatHint, ImportanceTable, LargeDocumentOutcome,
    ParsedDocument, ReadOutput, Reader, Reference, ReferenceKind, Section, SectionId, SectionTree,
    SpecialBlock, SpecialBlockKind, StrategySelection, WindowFailure, LARGE_OFFSET,
};
