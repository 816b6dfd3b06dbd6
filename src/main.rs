use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use governor_tracker::config::{Config, DEFAULT_CONFIG_PATH};
use governor_tracker::logging::{setup_logging, LogLevel};
use governor_tracker::storage::{SchemaStatus, StorageClient};
use governor_tracker::{init, open_tracker, run};
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "governor-tracker", version, about = "Discord bot that tracks governor accounts, farm links and stat snapshots")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overrides the configured log level (error, warn, info, debug, verbose)
    #[arg(long)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Discord bot (default)
    Run,
    /// Apply pending schema migrations, or revert to an earlier version
    Migrate {
        #[arg(long)]
        to: Option<i64>,
    },
    /// Show the database schema version
    Status,
    /// Import a CSV export into the database without starting the bot
    Import { csv: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.set_log_level(level);
    }
    setup_logging(config.log_level, Path::new(&config.log_dir))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            config.prompt_for_missing_fields()?;
            let config = Arc::new(RwLock::new(config));
            let clients = init(Arc::clone(&config)).await?;
            run(clients, config).await?;
        }
        Commands::Migrate { to } => {
            let (storage, _) = open_tracker(&config)?;
            let status = match to {
                Some(version) => storage.revert_to(version)?,
                None => storage.schema_status()?,
            };
            print_status(&status);
            storage.close()?;
        }
        Commands::Status => {
            match StorageClient::inspect(&config.database_path)? {
                Some(status) => print_status(&status),
                None => println!(
                    "{} {} (all migrations pending)",
                    "No database at".yellow(),
                    config.database_path
                ),
            }
        }
        Commands::Import { csv } => {
            let (storage, tracker) = open_tracker(&config)?;
            let report = tracker.importer.import_csv(File::open(&csv)?, Utc::now())?;
            storage.close()?;

            let headline = format!("Imported {}", csv.display());
            if report.failed == 0 {
                println!("{}", headline.green().bold());
            } else {
                println!("{} ({} failed)", headline.yellow().bold(), report.failed.to_string().red());
            }
            println!("{}", report);
        }
    }

    Ok(())
}

fn print_status(status: &SchemaStatus) {
    let current = status.current_version.to_string();
    let current = if status.pending_versions.is_empty() { current.green() } else { current.yellow() };
    println!("Schema version: {} (latest {})", current, status.target_version);
    if status.inferred_from_legacy {
        println!("{}", "Version was inferred from an untracked legacy database".yellow());
    }
    if !status.pending_versions.is_empty() {
        let pending: Vec<String> = status.pending_versions.iter().map(|v| v.to_string()).collect();
        println!("Pending migrations: {}", pending.join(", ").yellow());
    }
}
