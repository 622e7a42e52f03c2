use std::fmt::Write as FmtWrite;

use crate::models::{Answer, IngestReport, OutputFormat, RecordStatus};

pub trait Formatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusInfo {
    pub embedding_backend: String,
    /// Set when the embedding backend failed to initialize
    pub embedding_error: Option<String>,
    pub dimension: usize,
    pub generation_backend: String,
    pub generation_error: Option<String>,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub fragments: u64,
    pub record_store_configured: bool,
}

/// Run a writer over a fresh buffer. Writing into a `String` cannot fail.
fn render(write: impl FnOnce(&mut String) -> std::fmt::Result) -> String {
    let mut output = String::new();
    let _ = write(&mut output);
    output
}

fn record_note(status: &RecordStatus) -> Option<String> {
    match status {
        RecordStatus::Recorded => None,
        RecordStatus::Skipped => Some("answer not recorded (no record store configured)".into()),
        RecordStatus::NotRecorded { reason } => {
            Some(format!("answer generated but not recorded: {}", reason))
        }
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        render(|out| {
            let title = if report.is_complete() {
                "Ingestion Complete"
            } else {
                "Ingestion Partial"
            };
            writeln!(out, "{}", title)?;
            writeln!(out, "{}", "-".repeat(title.len()))?;
            writeln!(out, "Document:   {} ({})", report.filename, report.document_id)?;
            writeln!(out, "Collection: {}", report.collection)?;
            writeln!(out, "Fragments:  {}", report.total)?;
            writeln!(out, "Inserted:   {}", report.inserted)?;
            writeln!(out, "Failed:     {}", report.failed())?;
            for failure in &report.failures {
                writeln!(out, "  #{}: {}", failure.index, failure.reason)?;
            }
            if let Some(ref error) = report.registration_error {
                writeln!(out, "Not registered: {}", error)?;
            }
            writeln!(out, "Duration:   {}ms", report.duration_ms)
        })
    }

    fn format_answer(&self, answer: &Answer) -> String {
        render(|out| {
            writeln!(out, "{}", answer.text)?;
            writeln!(out)?;
            if !answer.sources.is_empty() {
                writeln!(out, "Sources:")?;
                for source in &answer.sources {
                    writeln!(out, "  - {} ({})", source.filename, source.document_id)?;
                }
            }
            writeln!(out, "Answer ID:     {}", answer.answer_id)?;
            writeln!(out, "Chat ID:       {}", answer.chat_id)?;
            writeln!(out, "Prompt tokens: {}", answer.prompt_token_count)?;
            if let Some(note) = record_note(&answer.record_status) {
                writeln!(out, "Note: {}", note)?;
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|out| {
            writeln!(out, "Status")?;
            writeln!(out, "------")?;

            match status.embedding_error {
                None => writeln!(
                    out,
                    "Embedding:     {} [READY] (dimension {})",
                    status.embedding_backend, status.dimension
                )?,
                Some(ref e) => writeln!(
                    out,
                    "Embedding:     {} [ERROR] {}",
                    status.embedding_backend, e
                )?,
            }
            match status.generation_error {
                None => writeln!(out, "Generation:    {} [READY]", status.generation_backend)?,
                Some(ref e) => writeln!(
                    out,
                    "Generation:    {} [ERROR] {}",
                    status.generation_backend, e
                )?,
            }
            writeln!(out)?;

            let vector_status = if status.vector_store_connected {
                "[CONNECTED]"
            } else {
                "[DISCONNECTED]"
            };
            writeln!(
                out,
                "Vector Store:  {} ({})",
                status.vector_store_driver, vector_status
            )?;
            if status.vector_store_connected {
                writeln!(out, "  URL:         {}", status.vector_store_url)?;
                writeln!(out, "  Collection:  {}", status.collection)?;
                writeln!(out, "  Fragments:   {}", status.fragments)?;
            }
            let records = if status.record_store_configured {
                "[CONFIGURED]"
            } else {
                "[NOT CONFIGURED]"
            };
            writeln!(out, "Record Store:  {}", records)
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: serde::Serialize>(&self, value: &T) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        self.to_json(&serde_json::json!({
            "complete": report.is_complete(),
            "report": report,
        }))
    }

    fn format_answer(&self, answer: &Answer) -> String {
        self.to_json(answer)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.to_json(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        render(|out| {
            let badge = if report.is_complete() { "✅" } else { "⚠️" };
            writeln!(out, "## Ingestion {}\n", badge)?;
            writeln!(out, "**Document:** `{}` ({})\n", report.filename, report.document_id)?;
            writeln!(out, "| Metric | Value |")?;
            writeln!(out, "|--------|-------|")?;
            writeln!(out, "| Collection | {} |", report.collection)?;
            writeln!(out, "| Fragments | {} |", report.total)?;
            writeln!(out, "| Inserted | {} |", report.inserted)?;
            writeln!(out, "| Failed | {} |", report.failed())?;
            writeln!(out, "| Duration | {}ms |", report.duration_ms)?;
            if !report.failures.is_empty() {
                writeln!(out, "\n### Failed fragments\n")?;
                for failure in &report.failures {
                    writeln!(out, "- `#{}` {}", failure.index, failure.reason)?;
                }
            }
            if let Some(ref error) = report.registration_error {
                writeln!(out, "\n> ⚠️ **Not registered:** {}", error)?;
            }
            Ok(())
        })
    }

    fn format_answer(&self, answer: &Answer) -> String {
        render(|out| {
            writeln!(out, "## Answer\n")?;
            writeln!(out, "{}\n", answer.text)?;
            if !answer.sources.is_empty() {
                writeln!(out, "### Sources\n")?;
                for source in &answer.sources {
                    writeln!(out, "- `{}` ({})", source.filename, source.document_id)?;
                }
                writeln!(out)?;
            }
            writeln!(
                out,
                "*Answer `{}` · {} prompt tokens*",
                answer.answer_id, answer.prompt_token_count
            )?;
            if let Some(note) = record_note(&answer.record_status) {
                writeln!(out, "\n> ⚠️ {}", note)?;
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|out| {
            writeln!(out, "## Status\n")?;

            let embedding = if status.embedding_error.is_none() { "✅" } else { "❌" };
            writeln!(out, "### Embedding ({}) {}\n", status.embedding_backend, embedding)?;
            writeln!(out, "- **Dimension:** {}", status.dimension)?;
            if let Some(ref e) = status.embedding_error {
                writeln!(out, "- **Error:** {}", e)?;
            }
            writeln!(out)?;

            let generation = if status.generation_error.is_none() { "✅" } else { "❌" };
            writeln!(out, "### Generation ({}) {}\n", status.generation_backend, generation)?;
            if let Some(ref e) = status.generation_error {
                writeln!(out, "- **Error:** {}\n", e)?;
            }

            let vector = if status.vector_store_connected { "✅" } else { "❌" };
            writeln!(
                out,
                "### Vector Store ({}) {}\n",
                status.vector_store_driver, vector
            )?;
            writeln!(out, "- **URL:** `{}`", status.vector_store_url)?;
            writeln!(out, "- **Collection:** {}", status.collection)?;
            writeln!(out, "- **Fragments:** {}", status.fragments)?;
            writeln!(out)?;

            let records = if status.record_store_configured { "✅" } else { "❌" };
            writeln!(out, "### Record Store {}", records)
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FragmentFailure, SourceAttribution};
    use uuid::Uuid;

    fn report() -> IngestReport {
        IngestReport {
            document_id: Uuid::nil(),
            filename: "gdp.docx".to_string(),
            collection: "econ".to_string(),
            total: 3,
            inserted: 2,
            failures: vec![FragmentFailure {
                index: 1,
                reason: "embedding timeout".to_string(),
            }],
            registration_error: None,
            duration_ms: 12,
        }
    }

    fn answer(record_status: RecordStatus) -> Answer {
        Answer {
            answer_id: Uuid::nil(),
            chat_id: Uuid::nil(),
            text: "GDP is output".to_string(),
            prompt_token_count: 42,
            sources: vec![SourceAttribution {
                filename: "gdp.docx".to_string(),
                document_id: Uuid::nil(),
            }],
            file_ids: vec![Uuid::nil()],
            record_status,
        }
    }

    #[test]
    fn test_text_report_marks_partial() {
        let text = TextFormatter.format_ingest_report(&report());
        assert!(text.starts_with("Ingestion Partial"));
        assert!(text.contains("#1: embedding timeout"));
    }

    #[test]
    fn test_text_answer_reports_unrecorded() {
        let text = TextFormatter.format_answer(&answer(RecordStatus::NotRecorded {
            reason: "pool timed out".to_string(),
        }));
        assert!(text.contains("GDP is output"));
        assert!(text.contains("gdp.docx"));
        assert!(text.contains("generated but not recorded: pool timed out"));

        let recorded = TextFormatter.format_answer(&answer(RecordStatus::Recorded));
        assert!(!recorded.contains("Note:"));
    }

    #[test]
    fn test_json_answer_round_trips() {
        let json = JsonFormatter::new(false).format_answer(&answer(RecordStatus::Recorded));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["prompt_token_count"], 42);
        assert_eq!(value["record_status"]["status"], "recorded");
    }

    #[test]
    fn test_json_report_has_complete_flag() {
        let json = JsonFormatter::new(true).format_ingest_report(&report());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["complete"], false);
        assert_eq!(value["report"]["inserted"], 2);
    }

    #[test]
    fn test_markdown_answer_lists_sources() {
        let md = MarkdownFormatter.format_answer(&answer(RecordStatus::Skipped));
        assert!(md.contains("### Sources"));
        assert!(md.contains("- `gdp.docx`"));
        assert!(md.contains("no record store configured"));
    }
}
