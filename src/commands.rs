use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, run_interactive_config, show_config};
use crate::database::Database;
use crate::database::lancedb::VectorStore;
use crate::database::postgres::RecordKind;
use crate::embeddings::OpenAiClient;
use crate::search::SearchInterface;
use crate::sync::{ChangePolicy, SyncEngine};

fn load_config() -> Result<Config> {
    let config = Config::load_default().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration is invalid; run 'gamevec config' to fix it")?;
    Ok(config)
}

/// Synchronize one collection from the source database into the vector store
#[inline]
pub async fn run_sync(
    kind: RecordKind,
    policy: ChangePolicy,
    limit: Option<i64>,
    game_id: Option<String>,
) -> Result<()> {
    let config = load_config()?;

    info!("Starting sync of {} with policy {}", kind, policy);
    println!(
        "Syncing {} (policy: {})...",
        style(kind.to_string()).cyan(),
        policy
    );

    let database = Database::new(&config.database_url()?)
        .await
        .context("Failed to connect to source database")?;
    let client = OpenAiClient::new(&config)?;
    let store = VectorStore::open(&config, kind).await?;

    let engine = SyncEngine::new(
        Arc::new(database),
        client,
        store,
        kind,
        config.sync.clone(),
    );

    let report = engine.run(policy, limit, game_id.as_deref()).await?;

    println!();
    println!(
        "{} {} records examined in {:.1}s",
        style("Done.").green().bold(),
        report.total(),
        report.elapsed.as_secs_f64()
    );
    println!("  New:        {}", report.new_count);
    println!("  Changed:    {}", report.changed_count);
    println!("  Unchanged:  {}", report.unchanged_count);
    println!("  Written:    {}", report.written);
    println!(
        "  Tokens:     {} (estimated {})",
        report.tokens_used, report.tokens_estimated
    );

    if !report.failed.is_empty() {
        println!();
        println!(
            "{} {} document(s) failed:",
            style("Warning:").yellow().bold(),
            report.failed.len()
        );
        for failure in &report.failed {
            println!("  {}: {}", failure.document_id, failure.error);
        }
    }

    Ok(())
}

/// Semantic search over one collection
#[inline]
pub async fn run_search(
    kind: RecordKind,
    query: String,
    limit: usize,
    game_id: Option<String>,
) -> Result<()> {
    let config = load_config()?;

    let client = OpenAiClient::new(&config)?;
    let store = VectorStore::open(&config, kind).await?;
    let interface = SearchInterface::new(client, store);

    let hits = interface.search(&query, limit, game_id.as_deref()).await?;

    if hits.is_empty() {
        println!("No matches in {}.", kind.collection_name());
        return Ok(());
    }

    println!(
        "Top {} match(es) in {}:",
        hits.len(),
        style(kind.collection_name()).cyan()
    );
    println!();

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} (distance {:.4}, game {})",
            rank + 1,
            style(&hit.document_id).bold(),
            hit.distance,
            hit.metadata.game_id
        );
        println!("   {}", summarize(&hit.document, 160));
    }

    Ok(())
}

/// Show collection and source row counts side by side
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("{}", style("Vector store").bold());
    for kind in [RecordKind::Feature, RecordKind::Screenshot] {
        // Read-only path: status must not create missing collections
        match VectorStore::open_existing(&config, kind).await {
            Ok(Some(store)) => {
                let count = store.count().await?;
                println!("  {}: {} document(s)", kind.collection_name(), count);
            }
            Ok(None) => println!("  {}: not synced yet", kind.collection_name()),
            Err(e) => println!("  {}: unavailable ({e})", kind.collection_name()),
        }
    }

    println!();
    println!("{}", style("Source database").bold());
    match Database::new(&config.database_url()?).await {
        Ok(database) => {
            for kind in [RecordKind::Feature, RecordKind::Screenshot] {
                let count = database.count_rows(kind).await?;
                println!("  {}: {} row(s)", kind, count);
            }
        }
        Err(e) => println!("  unavailable ({e})"),
    }

    Ok(())
}

/// Interactive configuration, or a read-only dump with `--show`
#[inline]
pub fn configure(show: bool) -> Result<()> {
    if show {
        show_config()
    } else {
        run_interactive_config()
    }
}

/// Single-line preview of an embedded document, field delimiters replaced
/// for display.
fn summarize(document: &str, max_chars: usize) -> String {
    let flat = document.replace('\u{1f}', " | ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let truncated: String = flat.chars().take(max_chars).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_replaces_delimiters_and_truncates() {
        let doc = "Dash Ability\u{1f}A burst of speed";
        assert_eq!(summarize(doc, 160), "Dash Ability | A burst of speed");

        let long = "x".repeat(200);
        let short = summarize(&long, 10);
        assert_eq!(short.chars().count(), 11);
        assert!(short.ends_with('…'));
    }
}
