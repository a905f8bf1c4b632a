mod hub;
mod llm;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_scout::policy::NamespacePolicy;
use model_scout::{Config, DynamicWhitelistManager, Pipeline, ScoutStorage, SqliteStorage};

use hub::HubApiClient;
use llm::CompletionApiClient;

#[derive(Parser)]
#[command(name = "scout", about = "Discovers and analyzes specialist models on the hub")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one discovery and analysis run
    Run {
        /// Maximum candidates fetched per listing source
        #[arg(long, default_value_t = 200)]
        limit: usize,
        /// Traverse every stage without writing to storage
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the dynamic namespace whitelist
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },
}

#[derive(Subcommand)]
enum WhitelistCommand {
    /// Add namespaces to the dynamic whitelist
    Promote { namespaces: Vec<String> },
    /// Remove dynamic whitelist entries
    Remove { namespaces: Vec<String> },
    /// Drop entries not seen within the given age
    Prune {
        #[arg(long, default_value_t = 90)]
        max_age_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,model_scout=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let storage = SqliteStorage::connect(&config.database_path)
        .await
        .context("Failed to open the scout database")?;

    match cli.command {
        Command::Run { limit, dry_run } => {
            let hub = HubApiClient::new(config.hub_token.clone())
                .with_base_url(config.hub_api_url.clone());
            let llm = CompletionApiClient::new(
                config.llm_api_url.clone(),
                config.llm_model.clone(),
                config.llm_api_key.clone(),
            );
            let pipeline = Pipeline::new(&config, &hub, &llm, &storage);
            let stats = pipeline.run(limit, dry_run).await?;
            println!("{}", stats.summary_line());
            if !stats.review_candidates.is_empty() {
                println!("tier2 review candidates: {}", stats.review_candidates.join(", "));
            }
        }
        Command::Whitelist { command } => {
            let manager = DynamicWhitelistManager::new(&config);
            match command {
                WhitelistCommand::Promote { namespaces } => {
                    let policy = NamespacePolicy::new(
                        &config,
                        storage.dynamic_whitelist().await?,
                        storage.dynamic_blacklist().await?,
                    );
                    let added = manager.promote(&namespaces, &policy, &storage).await?;
                    println!("whitelisted: {}", join(&added));
                }
                WhitelistCommand::Remove { namespaces } => {
                    let removed = manager.remove(&namespaces, &storage).await?;
                    println!("removed {removed} entries");
                }
                WhitelistCommand::Prune { max_age_days } => {
                    let pruned = manager.prune(max_age_days, &storage).await?;
                    println!("pruned: {}", join(&pruned));
                }
            }
            let remaining = storage.dynamic_whitelist_entries().await?;
            println!("dynamic whitelist now holds {} namespaces", remaining.len());
            for entry in remaining {
                println!(
                    "  {} ({}, last seen {})",
                    entry.namespace,
                    entry.origin.as_str(),
                    entry.last_seen.format("%Y-%m-%d")
                );
            }
        }
    }

    Ok(())
}

fn join(namespaces: &[String]) -> String {
    if namespaces.is_empty() {
        "(none)".to_string()
    } else {
        namespaces.join(", ")
    }
}
