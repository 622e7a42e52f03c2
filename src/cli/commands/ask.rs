use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::output::get_formatter;
use crate::models::{Config, Language, OutputFormat, Persona};
use crate::services::QuestionRequest;

use super::build_pipeline;

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question text")]
    pub question: String,

    #[arg(
        long,
        help = "JSON file with the prior transcript (array of strings, assistant turn first)"
    )]
    pub history: Option<PathBuf>,

    #[arg(long, short = 'c', help = "Collection to search")]
    pub collection: Option<String>,

    #[arg(long, short = 'l', default_value = "english", help = "english or chinese")]
    pub language: Language,

    #[arg(
        long,
        short = 'p',
        default_value = "chatting",
        help = "chatting, testing or theorem"
    )]
    pub persona: Persona,

    #[arg(long, short = 'k', help = "Number of fragments to retrieve")]
    pub top_k: Option<u64>,

    #[arg(long, help = "Chat id; a new one is generated when omitted")]
    pub chat_id: Option<Uuid>,

    #[arg(long, env = "USER", default_value = "Anonymous", help = "Sender recorded with the answer")]
    pub user: String,
}

fn read_history(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("history must be a JSON array of strings: {}", path.display()))
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }
    if args.top_k == Some(0) {
        anyhow::bail!("top-k must be at least 1");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let mut history = match args.history {
        Some(ref path) => read_history(path)?,
        None => Vec::new(),
    };
    history.push(question.to_string());

    let request = QuestionRequest {
        chat_id: args.chat_id.unwrap_or_else(Uuid::new_v4),
        sent_by: args.user,
        history,
        collection: args
            .collection
            .unwrap_or_else(|| config.search.default_collection.clone()),
        language: args.language,
        persona: args.persona,
        top_k: args.top_k,
    };

    let pipeline = build_pipeline(&config).await?;
    let answer = pipeline
        .answer(&request)
        .await
        .context("failed to answer question")?;

    print!("{}", formatter.format_answer(&answer));
    Ok(())
}
