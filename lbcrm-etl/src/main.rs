//! lbcrm-etl - Lui Bambini customer recency pipeline
//!
//! Loads the sales and customer spreadsheets, publishes customers, sales and
//! last purchases to the record store, and writes segment, statistics and
//! outreach message files to the data directory.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lbcrm_common::config::{StoreCredentials, TomlConfig, CONFIG_PATH_ENV};
use lbcrm_common::db::RecencyCategory;
use lbcrm_common::time::format_br_date;
use lbcrm_etl::config::{Backend, CliOverrides, Settings};
use lbcrm_etl::pipeline;
use lbcrm_etl::store::{PostgrestStore, RecordStore, SqliteStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for lbcrm-etl
#[derive(Parser, Debug)]
#[command(name = "lbcrm-etl")]
#[command(about = "Customer recency pipeline for Lui Bambini")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Directory holding input spreadsheets and output files
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Record store backend
    #[arg(short, long, global = true, value_enum)]
    backend: Option<Backend>,

    /// SQLite file used by the sqlite backend
    #[arg(long, global = true)]
    sqlite_path: Option<PathBuf>,

    /// Rows per insert request
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create missing tables and exit
    Migrate,
    /// Load spreadsheets, publish the snapshot and write local files
    Process,
    /// Recompute elapsed days of stored last purchases
    Refresh,
    /// Write recency statistics
    Stats,
    /// List customers idle for more than N days
    Inactive {
        /// Idle threshold in days (default from config)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Write one file per segment plus segment counts
    Segments,
    /// Generate outreach message samples per segment
    Messages,
    /// Refresh, then stats, inactive, segments and messages
    Report,
    /// Print stored last purchases, least idle first
    List {
        /// Only rows of this category (e.g. "31-60 dias")
        #[arg(long)]
        category: Option<RecencyCategory>,
    },
    /// Print a customer's stored sales, newest first
    History {
        /// Stored customer id
        customer_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let file_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let overrides = CliOverrides {
        data_dir: args.data_dir.clone(),
        backend: args.backend,
        sqlite_path: args.sqlite_path.clone(),
        batch_size: args.batch_size,
    };
    let settings = Settings::resolve(&overrides, &file_config);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting lbcrm-etl v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Data directory: {}", settings.data_dir.display());

    let store = open_store(&settings).await?;
    store
        .migrate()
        .await
        .context("Failed to prepare store schema")?;

    run(args.command, store.as_ref(), &settings).await
}

async fn open_store(settings: &Settings) -> Result<Box<dyn RecordStore>> {
    match settings.backend {
        Backend::Remote => {
            let credentials =
                StoreCredentials::from_env().context("Hosted store credentials missing")?;
            info!("Using hosted store at {}", credentials.url);
            let store =
                PostgrestStore::new(&credentials).context("Failed to build store client")?;
            Ok(Box::new(store))
        }
        Backend::Sqlite => {
            info!("Using local store at {}", settings.sqlite_path.display());
            let store = SqliteStore::open(&settings.sqlite_path)
                .await
                .context("Failed to open local store")?;
            Ok(Box::new(store))
        }
    }
}

async fn run(command: Command, store: &dyn RecordStore, settings: &Settings) -> Result<()> {
    match command {
        Command::Migrate => info!("Schema ready on {}", store.backend_name()),
        Command::Process => {
            let summary = pipeline::process(store, settings).await?;
            info!(
                "{} of {} sales matched a customer, {} last purchases computed",
                summary.matched_sales, summary.sales, summary.recency_rows
            );
            summary.publish?;
        }
        Command::Refresh => {
            pipeline::refresh(store).await?;
        }
        Command::Stats => {
            pipeline::statistics(store, settings).await?;
        }
        Command::Inactive { days } => {
            pipeline::inactive(store, settings, days.unwrap_or(settings.inactivity_days)).await?;
        }
        Command::Segments => {
            pipeline::segments(store, settings).await?;
        }
        Command::Messages => {
            pipeline::messages(store, settings).await?;
        }
        Command::Report => {
            let summary = pipeline::report(store, settings).await;
            let failures = summary.failures();
            if failures > 0 {
                bail!("{} report steps failed", failures);
            }
            info!("Report complete");
        }
        Command::List { category } => {
            for row in pipeline::list(store, category).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    row.tax_id,
                    row.customer_name,
                    row.last_purchase.map(format_br_date).unwrap_or_default(),
                    row.elapsed_days.map(|d| d.to_string()).unwrap_or_default(),
                    row.category
                );
            }
        }
        Command::History { customer_id } => {
            for sale in pipeline::history(store, customer_id).await? {
                println!(
                    "{}\t{}\t{}\t{:.2}",
                    format_br_date(sale.date),
                    sale.operation.unwrap_or_default(),
                    sale.item_count,
                    sale.total
                );
            }
        }
    }
    Ok(())
}
