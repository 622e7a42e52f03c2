use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use uuid::Uuid;

use crate::cli::output::get_formatter;
use crate::models::{Config, IngestReport, OutputFormat};
use crate::services::{DocumentSplitter, IngestRequest};

use super::build_pipeline;

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(required = true, help = "Path of the saved document")]
    pub path: PathBuf,

    #[arg(
        long = "type",
        short = 't',
        help = "Declared document format (docx, pptx, pdf, txt, md); defaults to the file extension"
    )]
    pub declared_format: Option<String>,

    #[arg(long, short = 'c', help = "Target collection")]
    pub collection: Option<String>,

    #[arg(long, help = "Document id; a new one is generated when omitted")]
    pub document_id: Option<Uuid>,

    #[arg(long, help = "Display name; defaults to the file name")]
    pub name: Option<String>,

    #[arg(long, help = "Document tags (e.g., 'course:econ101,year:2024')")]
    pub tags: Option<String>,

    #[arg(long, help = "Split only and print the fragments without indexing")]
    pub dry_run: bool,
}

/// Parse `key:value` pairs; a bare key maps to `true`.
pub(crate) fn parse_tags(input: &str) -> serde_json::Map<String, serde_json::Value> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((key, value)) => (
                key.trim().to_string(),
                serde_json::Value::String(value.trim().to_string()),
            ),
            None => (pair.to_string(), serde_json::Value::Bool(true)),
        })
        .collect()
}

fn ingest_spinner(filename: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("Indexing {}", filename));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if !args.path.is_file() {
        anyhow::bail!("not a file: {}", args.path.display());
    }

    let declared_format = match args.declared_format {
        Some(f) => f,
        None => args
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("file has no extension; pass --type"))?,
    };

    if args.dry_run {
        let splitter = DocumentSplitter::from_config(&config.splitter);
        let fragments = splitter
            .split(&args.path, &declared_format)
            .context("failed to split document")?;

        if verbose {
            for (i, fragment) in fragments.iter().enumerate() {
                eprintln!("[{}] {}", i, fragment);
            }
        }
        print!(
            "{}",
            formatter.format_message(&format!(
                "{} fragments from {} (dry run, nothing indexed)",
                fragments.len(),
                args.path.display()
            ))
        );
        return Ok(());
    }

    let collection = args
        .collection
        .unwrap_or_else(|| config.search.default_collection.clone());
    let mut request = IngestRequest::new(&args.path, declared_format, collection);
    if let Some(id) = args.document_id {
        request.document_id = id;
    }
    if let Some(name) = args.name {
        request.filename = name;
    }
    if let Some(ref tags) = args.tags {
        request.tags = serde_json::Value::Object(parse_tags(tags));
    }
    debug!(?request, "ingest request");

    let pipeline = build_pipeline(&config).await?;

    let spinner = if format == OutputFormat::Text {
        ingest_spinner(&request.filename)
    } else {
        ProgressBar::hidden()
    };
    let result = pipeline.ingest(&request).await;
    spinner.finish_and_clear();
    let report = result.context("failed to ingest document")?;

    print!("{}", formatter.format_ingest_report(&report));

    check_report(&report)
}

/// A run succeeds only if every fragment is indexed and the document is
/// registered, so `document_filename` can resolve its id later.
fn check_report(report: &IngestReport) -> Result<()> {
    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} fragments failed to index",
            report.failed(),
            report.total
        );
    }
    if let Some(ref error) = report.registration_error {
        anyhow::bail!(
            "document {} indexed but not registered: {}",
            report.document_id,
            error
        );
    }
    Ok(())
}
