use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, Rating};
use crate::services::{PgRecordStore, RecordStore};

#[derive(Debug, Args)]
pub struct RateArgs {
    #[arg(required = true, help = "Answer id printed by `ask`")]
    pub answer_id: Uuid,

    #[arg(
        long,
        conflicts_with = "down",
        required_unless_present = "down",
        help = "Mark the answer as helpful"
    )]
    pub up: bool,

    #[arg(long, required_unless_present = "up", help = "Mark the answer as unhelpful")]
    pub down: bool,
}

impl RateArgs {
    fn rating(&self) -> Rating {
        if self.up { Rating::Up } else { Rating::Down }
    }
}

pub async fn handle_rate(args: RateArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if config.records.url.is_none() {
        anyhow::bail!("no record store configured; set DATABASE_URL");
    }

    // Rating only touches the record store, so the providers are not started.
    let records = PgRecordStore::connect(&config.records)
        .await
        .context("failed to connect to record store")?;
    let rating = args.rating();
    records
        .update_rating(args.answer_id, rating)
        .await
        .with_context(|| format!("failed to rate answer {}", args.answer_id))?;

    print!(
        "{}",
        formatter.format_message(&format!("Rated answer {} {}", args.answer_id, rating))
    );
    Ok(())
}
