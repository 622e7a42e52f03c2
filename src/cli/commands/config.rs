use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file with defaults")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration (file plus environment)")]
    Show,
    #[command(about = "Show configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(force, format),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(),
    }
}

fn handle_init(force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to write config")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

/// Effective configuration with secrets masked.
fn redacted(mut config: Config) -> Config {
    let mask = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some("********".to_string());
        }
    };
    mask(&mut config.embedding.afs.api_key);
    mask(&mut config.embedding.openai.api_key);
    mask(&mut config.generation.afs.api_key);
    mask(&mut config.generation.openai.api_key);
    mask(&mut config.vector_store.api_key);
    mask(&mut config.records.url);
    config
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = redacted(Config::load()?);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path() {
        let state = if path.exists() { "" } else { " (not created)" };
        println!("# Config file: {}{}", path.display(), state);
        println!();
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path() -> Result<()> {
    let path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    let state = if path.exists() { "active" } else { "would be" };
    println!("Config file ({}): {}", state, path.display());

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        let state = if env_path.exists() { "active" } else { "would be" };
        println!(".env file ({}): {}", state, env_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = Config::default();
        config.generation.afs.api_key = Some("secret".to_string());
        config.records.url = Some("postgres://user:pw@db/ragqa".to_string());

        let shown = redacted(config);
        assert_eq!(shown.generation.afs.api_key.as_deref(), Some("********"));
        assert_eq!(shown.records.url.as_deref(), Some("********"));
        assert!(shown.embedding.openai.api_key.is_none());
    }
}
