use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use buildmyskincare::config::{self, AppConfig};
use buildmyskincare::routine::generate_shareable_id;
use buildmyskincare::{
    AnalysisState, Comment, Provider, RoutineAnalyzer, RoutineRecord, RoutineStore,
    SqliteRoutineStore,
};

#[derive(Parser, Debug)]
#[command(name = "bms", version, about = "Shared skincare routines with AI analysis")]
struct Cli {
    /// Routine database path (overrides config and BMS_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a routine from a JSON file
    Import {
        file: PathBuf,
    },
    /// Print a stored routine as JSON
    Show {
        id: String,
    },
    /// Analyze a routine with the configured AI provider
    Analyze {
        id: String,
        /// Re-analyze even if the routine is unchanged since its last analysis
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Add a comment to a routine
    Comment {
        id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        avatar_url: Option<String>,
        text: String,
    },
    /// Delete a routine
    Delete {
        id: String,
    },
    /// Store a provider API key in the OS keychain
    SetKey {
        provider: Provider,
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    buildmyskincare::init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }

    match cli.command {
        Commands::Import { file } => import(&config, file).await,
        Commands::Show { id } => {
            let record = store(&config)?.fetch_one(&id).await?;
            print_json(&record)
        }
        Commands::Analyze { id, yes } => analyze(&config, &id, yes).await,
        Commands::Comment {
            id,
            user_id,
            user_name,
            avatar_url,
            text,
        } => {
            let comment = Comment::new(user_id, user_name, avatar_url, text);
            let comment_id = comment.id.clone();
            store(&config)?.add_comment(&id, comment).await?;
            println!("{}", comment_id);
            Ok(())
        }
        Commands::Delete { id } => {
            store(&config)?.delete(&id).await?;
            info!("Deleted routine {}", id);
            Ok(())
        }
        Commands::SetKey { provider, key } => config::store_api_key(provider, &key),
    }
}

fn store(config: &AppConfig) -> Result<SqliteRoutineStore> {
    Ok(SqliteRoutineStore::new(config.database_path()?))
}

async fn import(config: &AppConfig, file: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut record: RoutineRecord = serde_json::from_str(&content)
        .with_context(|| format!("Invalid routine JSON in {}", file.display()))?;
    if record.shareable_id.trim().is_empty() {
        record.shareable_id = generate_shareable_id();
    }

    let id = record.shareable_id.clone();
    store(config)?.insert(record).await?;
    println!("{}", id);
    Ok(())
}

async fn analyze(config: &AppConfig, id: &str, confirmed: bool) -> Result<()> {
    let analyzer = RoutineAnalyzer::new(store(config)?, config.build_client()?);
    info!(
        "Analyzing routine {} with {} ({})",
        id,
        config.provider,
        config.model()
    );

    let mut run = analyzer.begin(id);
    run.request().await;
    if let AnalysisState::AwaitingConfirmation { last_analyzed } = run.state() {
        if !confirmed {
            eprintln!(
                "Routine {} is unchanged since its analysis at {}. Re-run with --yes to analyze again.",
                id,
                last_analyzed.to_rfc3339()
            );
            return Ok(());
        }
        run.confirm().await;
    }

    match run.into_state() {
        AnalysisState::Completed { analysis } => print_json(&analysis),
        AnalysisState::Failed { error, analysis } => {
            print_json(&analysis)?;
            bail!(error)
        }
        other => bail!("Analysis stopped in unexpected state: {}", other.name()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
