#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::settings::{API_KEY_ENV, MAX_EMBEDDING_DIMENSION, MIN_EMBEDDING_DIMENSION};
use super::{Config, get_config_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 gamevec Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the OpenAI-compatible embeddings endpoint.");
    eprintln!();

    let endpoint: String = Input::new()
        .with_prompt("Endpoint URL")
        .default(config.embeddings.endpoint.clone())
        .interact_text()?;
    config.embeddings.endpoint = endpoint;

    let model: String = Input::new()
        .with_prompt("Model name")
        .default(config.embeddings.model.clone())
        .interact_text()?;
    config.embeddings.model = model;

    let dimension: u32 = Input::new()
        .with_prompt(format!(
            "Embedding dimension ({MIN_EMBEDDING_DIMENSION}-{MAX_EMBEDDING_DIMENSION})"
        ))
        .default(config.embeddings.dimension)
        .validate_with(|value: &u32| {
            if (MIN_EMBEDDING_DIMENSION..=MAX_EMBEDDING_DIMENSION).contains(value) {
                Ok(())
            } else {
                Err("dimension out of range for this model")
            }
        })
        .interact_text()?;
    config.embeddings.dimension = dimension;

    eprintln!();
    eprintln!("{}", style("Source Database").bold().yellow());

    let database_url: String = Input::new()
        .with_prompt("PostgreSQL URL (blank to use DATABASE_URL)")
        .default(config.source.database_url.clone())
        .allow_empty(true)
        .interact_text()?;
    config.source.database_url = database_url;

    if config.api_key().is_err() {
        eprintln!();
        eprintln!(
            "{}",
            style(format!("⚠ {API_KEY_ENV} is not set in the environment")).yellow()
        );
        eprintln!("Set it before running a sync; the key is never written to disk.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.embeddings.endpoint).cyan());
    eprintln!("  Model: {}", style(&config.embeddings.model).cyan());
    eprintln!("  Dimension: {}", style(config.embeddings.dimension).cyan());
    eprintln!(
        "  API key: {}",
        if config.api_key().is_ok() {
            style(format!("set via {API_KEY_ENV}")).green()
        } else {
            style(format!("missing ({API_KEY_ENV})")).red()
        }
    );

    eprintln!();
    eprintln!("{}", style("Source Database:").bold().yellow());
    match config.database_url() {
        Ok(url) => eprintln!("  URL: {}", style(redact_url(&url)).cyan()),
        Err(_) => eprintln!("  URL: {}", style("not configured").red()),
    }

    eprintln!();
    eprintln!("{}", style("Sync Settings:").bold().yellow());
    eprintln!(
        "  Rate limit delay: {} ms",
        style(config.sync.rate_limit_delay_ms).cyan()
    );
    eprintln!(
        "  Concurrency: {}",
        style(config.sync.embedding_concurrency).cyan()
    );
    eprintln!(
        "  Upsert batch size: {}",
        style(config.sync.upsert_batch_size).cyan()
    );
    eprintln!(
        "  Retry attempts: {}",
        style(config.sync.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Vector store: {}",
        style(config.vector_database_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let dir = get_config_dir().context("Failed to resolve config directory")?;
    Config::load(&dir).or_else(|_| {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Ok(Config {
            base_dir: dir,
            ..Config::default()
        })
    })
}

/// Hide the password portion of a connection string for display.
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
