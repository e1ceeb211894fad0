//! Local file reader for markdown, plain text and HTML sources

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::html::HtmlConverter;
use crate::domain::error::ReaderError;
use crate::domain::ingestion::reader::decode_utf8;
use crate::domain::ingestion::{
    FormatHint, ReadOutput, Reader, detect_format_from_filename, detect_format_from_mime,
};
use crate::domain::DomainError;

const PAGE_BREAK: char = '\x0c';

/// Reads text documents from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileReader {
    html: HtmlConverter,
}

impl FileReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format of `path`, by extension first and then by guessed MIME type
    pub fn detect_format(path: &Path) -> Option<FormatHint> {
        let name = path.file_name()?.to_string_lossy();
        detect_format_from_filename(&name).or_else(|| {
            mime_guess::from_path(path)
                .first()
                .and_then(|mime| detect_format_from_mime(mime.essence_str()))
        })
    }

    /// Convert already loaded content the same way `read` does
    pub fn convert(&self, path: &Path, text: String, hint: FormatHint) -> Result<ReadOutput, ReaderError> {
        if text.contains('\0') {
            return Err(ReaderError::CorruptInput {
                path: path.display().to_string(),
                message: "Binary content in text document".to_string(),
            });
        }

        let (text, hint) = match hint {
            FormatHint::Html => (self.html.convert(&text), FormatHint::Markdown),
            other => (text, other),
        };

        let breaks: Vec<usize> = text
            .char_indices()
            .filter(|(_, c)| *c == PAGE_BREAK)
            .map(|(i, _)| i)
            .collect();

        let output = ReadOutput::new(text, hint);
        Ok(if breaks.is_empty() {
            output
        } else {
            output.with_page_breaks(breaks)
        })
    }
}

#[async_trait]
impl Reader for FileReader {
    async fn read(&self, path: &Path) -> Result<ReadOutput, DomainError> {
        let hint = Self::detect_format(path).ok_or_else(|| ReaderError::UnsupportedFormat {
            path: path.display().to_string(),
        })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| ReaderError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), format = ?hint, "Read source file");

        let text = decode_utf8(path, bytes)?;
        Ok(self.convert(path, text, hint)?)
    }
}
