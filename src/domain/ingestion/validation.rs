//! Validation helpers for ingestion

use crate::domain::DomainError;

use super::pipeline::FormatHint;

/// Detect the format hint from a filename extension
pub fn detect_format_from_filename(filename: &str) -> Option<FormatHint> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();

    FormatHint::ALL
        .into_iter()
        .find(|hint| hint.extensions().contains(&ext.as_str()))
}

/// Detect the format hint from a MIME type, ignoring parameters such as charset
pub fn detect_format_from_mime(mime: &str) -> Option<FormatHint> {
    let mime_lower = mime.to_lowercase();

    FormatHint::ALL.into_iter().find(|hint| {
        hint.mime_types()
            .iter()
            .any(|known| mime_lower.starts_with(known))
    })
}

/// Validate document ID format
pub fn validate_document_id(id: &str) -> Result<(), DomainError> {
    if id.trim().is_empty() {
        return Err(DomainError::validation("Document ID cannot be empty"));
    }

    if id.len() > 255 {
        return Err(DomainError::validation(
            "Document ID cannot exceed 255 characters",
        ));
    }

    Ok(())
}

/// Validate the window size used for oversized documents
pub fn validate_unit_size(unit_size: usize) -> Result<(), DomainError> {
    if unit_size < 100 {
        return Err(DomainError::validation(
            "Unit size must be at least 100 characters",
        ));
    }

    Ok(())
}

/// Validate a batch concurrency limit
pub fn validate_concurrency(concurrency: usize) -> Result<(), DomainError> {
    if concurrency == 0 {
        return Err(DomainError::validation(
            "Concurrency must be greater than 0",
        ));
    }

    if concurrency > 1024 {
        return Err(DomainError::validation("Concurrency cannot exceed 1024"));
    }

    Ok(())
}
