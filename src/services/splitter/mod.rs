//! Document splitter: file on disk to ordered text fragments.
//!
//! Extraction yields structural elements (paragraphs, lines). Elements that
//! normalize to nothing are dropped, the rest lose every newline and space,
//! are concatenated, and the result is cut on the configured delimiter.

mod ooxml;

use std::path::Path;

use tracing::debug;

use crate::error::SplitError;
use crate::models::{DocumentFormat, SplitterConfig};
use crate::utils::normalize_element;

#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    delimiter: String,
}

impl Default for DocumentSplitter {
    fn default() -> Self {
        Self::from_config(&SplitterConfig::default())
    }
}

impl DocumentSplitter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn from_config(config: &SplitterConfig) -> Self {
        Self::new(config.delimiter.clone())
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split `path`, which the caller declares to be of format `declared`.
    ///
    /// Blocking: callers on an async runtime should use `spawn_blocking`.
    pub fn split(&self, path: &Path, declared: &str) -> Result<Vec<String>, SplitError> {
        let format = check_format(path, declared)?;

        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            debug!(path = %path.display(), "empty document");
            return Ok(Vec::new());
        }

        let elements = extract_elements(format, &bytes)?;
        let fragments = self.split_elements(elements);

        debug!(
            path = %path.display(),
            format = %format,
            fragments = fragments.len(),
            "document split"
        );
        Ok(fragments)
    }

    /// Normalize, concatenate and cut already extracted elements.
    pub fn split_elements<I, S>(&self, elements: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined: String = elements
            .into_iter()
            .map(|e| normalize_element(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();

        if self.delimiter.is_empty() {
            return if joined.is_empty() {
                Vec::new()
            } else {
                vec![joined]
            };
        }

        joined
            .split(self.delimiter.as_str())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Match the file extension against the declared format, then resolve the
/// format. No content sniffing is done.
pub fn check_format(path: &Path, declared: &str) -> Result<DocumentFormat, SplitError> {
    let declared_normalized = declared.trim().trim_start_matches('.').to_ascii_lowercase();
    let actual = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if actual != declared_normalized {
        return Err(SplitError::FormatMismatch {
            actual,
            declared: declared.to_string(),
        });
    }

    declared_normalized.parse()
}

fn extract_elements(format: DocumentFormat, bytes: &[u8]) -> Result<Vec<String>, SplitError> {
    match format {
        DocumentFormat::Docx => ooxml::docx_paragraphs(bytes),
        DocumentFormat::Pptx => ooxml::pptx_paragraphs(bytes),
        DocumentFormat::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| SplitError::ExtractionError(format!("PDF extraction error: {}", e)))?;
            Ok(text.lines().map(str::to_string).collect())
        }
        DocumentFormat::Txt | DocumentFormat::Md => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| SplitError::ExtractionError(format!("invalid UTF-8: {}", e)))?;
            Ok(text.lines().map(str::to_string).collect())
        }
    }
}
