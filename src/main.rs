//! Model Sizes - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_sizes::config::SizeCacheConfig;
use model_sizes::{
    Catalog, HubClient, HubToken, Reconciler, RetryEngine, RetryPlan, SizeCacheStore,
    SizeResolver, prune_orphans, report,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "model-sizes")]
#[command(about = "Model size cache reconciliation and retry", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override size cache file
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Override catalog file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare the catalog with the size cache
    Report,
    /// Re-resolve every failed record
    Retry {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Resolve catalog entries that have no record yet
    Fill {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Resolve a single repository or file without touching the cache
    Check {
        repo_id: String,
        /// File inside the repository; omit to size the whole repository
        filename: Option<String>,
    },
    /// Look up keys in the catalog and the cache
    Search { term: String },
    /// Remove cache records that no catalog entry maps to
    Prune {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for reports
    match cli.log_format.as_str() {
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
    }

    // Load configuration
    let mut config = SizeCacheConfig::load(cli.config)?;

    // CLI overrides
    if let Some(cache_file) = cli.cache_file {
        config.cache_file = cache_file;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_file = catalog;
    }

    config.validate()?;

    tracing::info!(
        cache_file = ?config.cache_file,
        catalog_file = ?config.catalog_file,
        endpoint = %config.hub.endpoint,
        pacing_delay_ms = config.pacing_delay_ms,
        "Configuration loaded"
    );

    let store = SizeCacheStore::new(config.cache_file.clone());

    match cli.command {
        Command::Report => {
            let catalog = Catalog::load(&config.catalog_file).await?;
            let document = store.load().await?;
            let reconciler = Reconciler::new(&catalog, &document)?;
            let diff = reconciler.reconcile();
            print!("{}", report::render_diff(&reconciler, &diff));
        }
        Command::Retry { yes } => {
            let mut document = store.load().await?;
            let plan = RetryPlan::from_keys(&document.failed_keys(), &document);
            print!("{}", report::render_plan(&plan));
            if plan.is_empty() {
                return Ok(());
            }
            if !yes && !confirm(&format!("Retry {} failed models?", plan.len()))? {
                println!("Cancelled.");
                return Ok(());
            }

            let engine = retry_engine(&config)?;
            let summary = engine.execute(&plan, &mut document, &store).await?;
            print!("{}", report::render_summary(&summary, store.path()));
        }
        Command::Fill { yes } => {
            let catalog = Catalog::load(&config.catalog_file).await?;
            let mut document = store.load_or_new().await?;
            let diff = Reconciler::new(&catalog, &document)?.reconcile();
            if diff.missing.is_empty() {
                println!("No missing models to fill.");
                return Ok(());
            }
            println!("Found {} catalog entries without a size record.", diff.missing.len());
            if !yes && !confirm(&format!("Resolve {} missing models?", diff.missing.len()))? {
                println!("Cancelled.");
                return Ok(());
            }

            let engine = retry_engine(&config)?;
            let summary = engine
                .fill_missing(&diff.missing, &mut document, &store)
                .await?;
            print!("{}", report::render_summary(&summary, store.path()));
        }
        Command::Check { repo_id, filename } => {
            let resolver = size_resolver(&config)?;
            let resolution = resolver.resolve_size(&repo_id, filename.as_deref()).await;
            print!(
                "{}",
                report::render_check(&repo_id, filename.as_deref(), &resolution)
            );
        }
        Command::Search { term } => {
            let catalog = Catalog::load(&config.catalog_file).await?;
            let document = store.load().await?;
            let reconciler = Reconciler::new(&catalog, &document)?;
            print!(
                "{}",
                report::render_search(&term, &reconciler.search(&term))
            );
        }
        Command::Prune { yes } => {
            let catalog = Catalog::load(&config.catalog_file).await?;
            let mut document = store.load().await?;
            let diff = Reconciler::new(&catalog, &document)?.reconcile();
            if diff.extra.is_empty() {
                println!("No orphaned records.");
                return Ok(());
            }
            for key in &diff.extra {
                println!("  - {}", key);
            }
            if !yes && !confirm(&format!("Remove {} orphaned records?", diff.extra.len()))? {
                println!("Cancelled.");
                return Ok(());
            }

            let removed = prune_orphans(&mut document, &diff.extra);
            store.save(&document).await?;
            println!("Removed {} records from {}", removed.len(), store.path().display());
        }
    }

    Ok(())
}

fn size_resolver(config: &SizeCacheConfig) -> Result<SizeResolver> {
    let token = HubToken::resolve();
    match &token {
        Some(token) => tracing::info!(
            token = %token.masked(),
            source = %token.source(),
            "Using hub token"
        ),
        None => tracing::info!("No hub token found, only public repositories will resolve"),
    }

    let client = HubClient::new(&config.hub, token)?;
    Ok(SizeResolver::new(Arc::new(client)))
}

fn retry_engine(config: &SizeCacheConfig) -> Result<RetryEngine> {
    Ok(
        RetryEngine::new(size_resolver(config)?, config.pacing_delay())
            .with_checkpoint_every(config.checkpoint_every),
    )
}

/// Ask a y/N question on the terminal
fn confirm(question: &str) -> Result<bool> {
    print!("\n{} (y/N): ", question);
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
