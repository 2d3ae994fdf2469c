use clap::{Parser, Subcommand};
use gamevec::commands::{configure, run_search, run_sync, show_status};
use gamevec::database::postgres::RecordKind;
use gamevec::sync::ChangePolicy;

#[derive(Parser, Debug)]
#[command(name = "gamevec")]
#[command(about = "Sync game metadata embeddings into a vector store and search them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configure the embedding provider and source database
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Synchronize a collection from the source database
    Sync {
        /// Collection to sync: features or screenshots
        kind: RecordKind,
        /// Change detection policy: content_hash, timestamp, force_all, skip_existing
        #[arg(long, default_value_t = ChangePolicy::default())]
        policy: ChangePolicy,
        /// Only process the first N source rows
        #[arg(long)]
        limit: Option<i64>,
        /// Restrict the run to one game
        #[arg(long)]
        game_id: Option<String>,
    },
    /// Semantic search over a collection
    Search {
        /// Collection to search: features or screenshots
        kind: RecordKind,
        /// Natural-language query
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Restrict results to one game
        #[arg(long)]
        game_id: Option<String>,
    },
    /// Show collection and source row counts
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            configure(show)?;
        }
        Commands::Sync {
            kind,
            policy,
            limit,
            game_id,
        } => {
            run_sync(kind, policy, limit, game_id).await?;
        }
        Commands::Search {
            kind,
            query,
            limit,
            game_id,
        } => {
            run_search(kind, query, limit, game_id).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["gamevec", "status"]);
        assert!(matches!(cli.unwrap().command, Commands::Status));

        let cli = Cli::try_parse_from([
            "gamevec",
            "sync",
            "features",
            "--policy",
            "force_all",
            "--limit",
            "25",
            "--game-id",
            "game_a",
        ])
        .unwrap();
        match cli.command {
            Commands::Sync {
                kind,
                policy,
                limit,
                game_id,
            } => {
                assert_eq!(kind, RecordKind::Feature);
                assert_eq!(policy, ChangePolicy::ForceAll);
                assert_eq!(limit, Some(25));
                assert_eq!(game_id.as_deref(), Some("game_a"));
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn sync_defaults_to_content_hash() {
        let cli = Cli::try_parse_from(["gamevec", "sync", "screenshots"]).unwrap();
        match cli.command {
            Commands::Sync { kind, policy, .. } => {
                assert_eq!(kind, RecordKind::Screenshot);
                assert_eq!(policy, ChangePolicy::ContentHash);
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let cli = Cli::try_parse_from(["gamevec", "sync", "maps"]);
        assert!(matches!(
            cli.unwrap_err().kind(),
            ErrorKind::ValueValidation
        ));
    }

    #[test]
    fn search_requires_a_query() {
        let cli = Cli::try_parse_from(["gamevec", "search", "features"]);
        assert!(cli.is_err());
    }
}
