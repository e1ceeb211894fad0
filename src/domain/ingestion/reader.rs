//! Reader seam: raw text extraction from source files

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

use super::pipeline::FormatHint;
use crate::domain::error::{DomainError, ReaderError};

#[cfg(test)]
use mockall::automock;

/// Text extracted from a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOutput {
    pub text: String,
    pub format_hint: FormatHint,
    /// Byte offsets of page breaks, when the source has pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_breaks: Option<Vec<usize>>,
}

impl ReadOutput {
    pub fn new(text: impl Into<String>, format_hint: FormatHint) -> Self {
        Self {
            text: text.into(),
            format_hint,
            page_breaks: None,
        }
    }

    pub fn with_page_breaks(mut self, breaks: Vec<usize>) -> Self {
        self.page_breaks = Some(breaks);
        self
    }

    /// Page number (1-based) containing `offset`, if pages are known
    pub fn page_of(&self, offset: usize) -> Option<usize> {
        self.page_breaks
            .as_ref()
            .map(|breaks| breaks.iter().take_while(|b| **b <= offset).count() + 1)
    }
}

/// Extracts plain or lightly structured text from a file
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Reader: Send + Sync + Debug {
    /// Read a file into text plus a format hint
    ///
    /// Fails with `UnsupportedFormat` or `CorruptInput` reader errors.
    async fn read(&self, path: &Path) -> Result<ReadOutput, DomainError>;
}

/// Decode raw bytes as UTF-8 text, reporting corrupt input against `path`
pub fn decode_utf8(path: &Path, bytes: Vec<u8>) -> Result<String, ReaderError> {
    String::from_utf8(bytes).map_err(|e| ReaderError::CorruptInput {
        path: path.display().to_string(),
        message: format!("Invalid UTF-8: {}", e),
    })
}
