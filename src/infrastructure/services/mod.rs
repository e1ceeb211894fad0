//! Infrastructure services

mod pipeline_service;

pub use pipeline_service::{
    BatchDocument, DocumentAnalysis, DocumentChunker, DocumentPipeline, RankedSection,
};
