//! Results reported back to callers of the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::search::SourceAttribution;

/// A fragment that could not be embedded or stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentFailure {
    /// Position of the fragment in split order
    pub index: usize,
    pub reason: String,
}

/// Outcome of ingesting one document.
///
/// A partially indexed document is reported, never treated as success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub filename: String,
    pub collection: String,
    pub total: usize,
    pub inserted: usize,
    pub failures: Vec<FragmentFailure>,
    /// Set when the document metadata could not be registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_error: Option<String>,
    pub duration_ms: u64,
}

impl IngestReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True only if every fragment was stored. Registration is reported
    /// separately in `registration_error`.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.inserted == self.total
    }
}

/// Whether an answer made it into the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    Recorded,
    /// The answer was generated but the QA record was not written
    NotRecorded { reason: String },
    /// No record store is configured
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer_id: Uuid,
    pub chat_id: Uuid,
    pub text: String,
    pub prompt_token_count: u64,
    /// One entry per filename, in rank order
    pub sources: Vec<SourceAttribution>,
    /// Document ids of every retrieved fragment, in rank order
    pub file_ids: Vec<Uuid>,
    pub record_status: RecordStatus,
}

impl Answer {
    pub fn is_recorded(&self) -> bool {
        self.record_status == RecordStatus::Recorded
    }
}

/// Thumbs-up / thumbs-down feedback on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    pub fn as_bool(&self) -> bool {
        matches!(self, Rating::Up)
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Up => write!(f, "up"),
            Rating::Down => write!(f, "down"),
        }
    }
}
