use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SplitError;

/// Document formats the splitter recognizes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Docx,
    Pptx,
    Pdf,
    Txt,
    Md,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 5] = [
        DocumentFormat::Docx,
        DocumentFormat::Pptx,
        DocumentFormat::Pdf,
        DocumentFormat::Txt,
        DocumentFormat::Md,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Md => "md",
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        DocumentFormat::ALL
            .into_iter()
            .find(|f| f.extension() == normalized)
            .ok_or_else(|| SplitError::UnsupportedFormat(s.to_string()))
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// A slice of a source document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub source_document_id: Uuid,
    pub source_filename: String,
    pub collection: String,
}

impl Fragment {
    pub fn new(
        text: impl Into<String>,
        source_document_id: Uuid,
        source_filename: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_document_id,
            source_filename: source_filename.into(),
            collection: collection.into(),
        }
    }

    /// Stable point id for the `index`-th fragment of a document.
    pub fn point_id(&self, index: usize) -> Uuid {
        let name = format!("{}:{}:{}", self.collection, self.source_document_id, index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}
