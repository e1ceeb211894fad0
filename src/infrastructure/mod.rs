//! Infrastructure layer - Chunking, indexing and service implementations

pub mod indexing;
pub mod ingestion;
pub mod logging;
pub mod services;
