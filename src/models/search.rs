//! Search-related models for retrieval results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A single retrieved fragment.
///
/// Results from one search are ordered by descending score and may repeat
/// the same `source_filename` across different fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Fragment text as stored at ingestion
    pub fragment_text: String,

    pub source_filename: String,

    pub source_document_id: Uuid,

    /// Similarity score, higher is closer
    pub score: f32,
}

/// A document credited for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub filename: String,
    pub document_id: Uuid,
}

/// Collapse results to one attribution per filename, keeping rank order.
pub fn dedup_by_filename(results: &[SearchResult]) -> Vec<SourceAttribution> {
    let mut seen = std::collections::HashSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.source_filename.as_str()))
        .map(|r| SourceAttribution {
            filename: r.source_filename.clone(),
            document_id: r.source_document_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(filename: &str, id: Uuid, score: f32) -> SearchResult {
        SearchResult {
            fragment_text: format!("text from {filename}"),
            source_filename: filename.to_string(),
            source_document_id: id,
            score,
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_dedup_by_filename_keeps_rank_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let results = vec![
            result("macro.pdf", a, 0.9),
            result("micro.docx", b, 0.8),
            result("macro.pdf", a, 0.7),
        ];

        let sources = dedup_by_filename(&results);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].filename, "macro.pdf");
        assert_eq!(sources[0].document_id, a);
        assert_eq!(sources[1].filename, "micro.docx");
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_by_filename(&[]).is_empty());
    }
}
