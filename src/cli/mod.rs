//! CLI module for the retrieval-augmented QA tool.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions over uploaded documents with retrieval-augmented generation.
#[derive(Debug, Parser)]
#[command(name = "ragqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check provider and store status
    Status,

    /// Split a document and index its fragments
    Ingest(commands::IngestArgs),

    /// Answer a question from indexed documents
    Ask(commands::AskArgs),

    /// Rate a recorded answer
    Rate(commands::RateArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from([
            "ragqa", "ingest", "notes.docx", "--type", "docx", "-c", "econ", "-f", "json",
        ]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.declared_format.as_deref(), Some("docx"));
                assert_eq!(args.collection.as_deref(), Some("econ"));
                assert!(!args.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rate_requires_direction() {
        let id = "5f0c6d4e-8d0b-4a57-9d43-3d3b8e0f2a11";
        assert!(Cli::try_parse_from(["ragqa", "rate", id]).is_err());
        assert!(Cli::try_parse_from(["ragqa", "rate", id, "--up", "--down"]).is_err());
        assert!(Cli::try_parse_from(["ragqa", "rate", id, "--down"]).is_ok());
    }

    #[test]
    fn test_parse_ask_persona() {
        let cli = Cli::parse_from(["ragqa", "ask", "What is GDP?", "-p", "theorem", "-l", "zh"]);
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.persona, crate::models::Persona::Theorem);
                assert_eq!(args.language, crate::models::Language::Chinese);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
