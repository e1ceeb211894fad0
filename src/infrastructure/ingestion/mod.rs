//! Document ingestion infrastructure
//!
//! This module provides the structure parser, boundary detector, chunking engine,
//! feature analyzer, parallel processor and file readers.

pub mod analyzer;
pub mod boundary;
pub mod chunkers;
pub mod parallel;
pub mod parser;
pub mod readers;
pub mod references;

pub use analyzer::DocumentFeatureAnalyzer;
pub use boundary::BoundaryDetector;
pub use chunkers::ChunkingEngine;
pub use parallel::{CancellationFlag, ParallelChunkProcessor, Window, WindowWorker, split_windows};
pub use parser::StructureParser;
pub use readers::{FileReader, HtmlConverter};
pub use references::{
    ReferenceExtractor, ReferenceResolver, TieBreak, incoming_reference_counts,
    rank_sections_by_references,
};
