use activity_recommender::{
    build_store, repository::DEFAULT_SEARCH_LIMIT, ActivityRepository, ConfigSource,
    MergeStrategy, Result,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Maintenance tool for the activity collection
#[derive(Debug, Parser)]
#[command(name = "activities", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write every stored activity to a JSON file
    Export {
        #[arg(default_value = "activities.json")]
        path: PathBuf,
    },
    /// Merge activities from a JSON file
    Import {
        path: PathBuf,
        /// What to do when an activity already exists: update or skip
        #[arg(long, default_value_t = MergeStrategy::Update)]
        strategy: MergeStrategy,
    },
    /// Overwrite activities from a JSON file in one batch
    Upload { path: PathBuf },
    /// Print one activity
    Get { name: String },
    /// Remove one activity
    Delete { name: String },
    /// Search by interests and categories
    Search {
        #[arg(long = "interest")]
        interests: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = ConfigSource::from_environment()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(source.log_level()).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store_url = source.store_url();
    if store_url.is_none() {
        warn!("No STORE_URL configured; changes will not outlive this process");
    }
    let repository = ActivityRepository::new(build_store(store_url.as_deref()));

    match cli.command {
        Command::Export { path } => {
            let count = repository.export(&path).await?;
            info!("Exported {} activities to {}", count, path.display());
        }
        Command::Import { path, strategy } => {
            let stats = repository.import(&path, strategy).await?;
            info!("Import from {} ({}): {}", path.display(), strategy, stats);
            println!("{}", stats);
        }
        Command::Upload { path } => {
            let count = repository.upload(&path).await?;
            info!("Uploaded {} activities from {}", count, path.display());
        }
        Command::Get { name } => match repository.read(&name).await? {
            Some(activity) => println!("{}", serde_json::to_string_pretty(&activity)?),
            None => {
                eprintln!("Activity not found: {}", name);
                std::process::exit(1);
            }
        },
        Command::Delete { name } => {
            repository.delete(&name).await?;
            info!("Deleted activity {}", name);
        }
        Command::Search {
            interests,
            categories,
            limit,
        } => {
            let found = repository.search(&interests, &categories, limit).await?;
            println!("{}", serde_json::to_string_pretty(&found)?);
        }
    }

    Ok(())
}
