use thiserror::Error;

/// Failures reported by a document reader
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Corrupt input in {path}: {message}")]
    CorruptInput { path: String, message: String },

    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Boundary computation error: {message}")]
    BoundaryComputation { message: String },

    #[error("Window {window_index} failed: {message}")]
    WindowProcessing { window_index: usize, message: String },

    #[error(
        "Index write failed for document '{doc_id}' (entry: {entry_id:?}, chunk: {chunk_ordinal:?}, orphaned: {orphaned}): {cause}",
        orphaned = .orphaned_entry_ids.len()
    )]
    IndexWrite {
        doc_id: String,
        entry_id: Option<String>,
        chunk_ordinal: Option<u64>,
        cause: String,
        /// Entries already deleted from the index before the failure
        deleted_entry_ids: Vec<String>,
        /// Entries this call wrote whose rollback delete also failed
        orphaned_entry_ids: Vec<String>,
    },

    #[error("Corrupt state for document '{doc_id}': {message}")]
    StateCorruption { doc_id: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn boundary(message: impl Into<String>) -> Self {
        Self::BoundaryComputation {
            message: message.into(),
        }
    }

    pub fn window(window_index: usize, message: impl Into<String>) -> Self {
        Self::WindowProcessing {
            window_index,
            message: message.into(),
        }
    }

    pub fn index_write(doc_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::IndexWrite {
            doc_id: doc_id.into(),
            entry_id: None,
            chunk_ordinal: None,
            cause: cause.into(),
            deleted_entry_ids: Vec::new(),
            orphaned_entry_ids: Vec::new(),
        }
    }

    pub fn state_corruption(doc_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StateCorruption {
            doc_id: doc_id.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the entry id an index write failed on
    pub fn with_entry_id(mut self, id: impl Into<String>) -> Self {
        if let Self::IndexWrite { entry_id, .. } = &mut self {
            *entry_id = Some(id.into());
        }
        self
    }

    /// Attach the ordinal of the chunk an index write failed on
    pub fn with_chunk_ordinal(mut self, ordinal: u64) -> Self {
        if let Self::IndexWrite { chunk_ordinal, .. } = &mut self {
            *chunk_ordinal = Some(ordinal);
        }
        self
    }

    /// Record which entries were already deleted when an index write failed
    pub fn with_deleted_entries(mut self, ids: Vec<String>) -> Self {
        if let Self::IndexWrite {
            deleted_entry_ids, ..
        } = &mut self
        {
            *deleted_entry_ids = ids;
        }
        self
    }

    /// Record entries left behind in the index after a failed rollback
    pub fn with_orphaned_entries(mut self, ids: Vec<String>) -> Self {
        if let Self::IndexWrite {
            orphaned_entry_ids, ..
        } = &mut self
        {
            *orphaned_entry_ids = ids;
        }
        self
    }

    /// Whether the error belongs to the locally recoverable parse/chunk family
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::BoundaryComputation { .. } | Self::WindowProcessing { .. }
        )
    }
}
