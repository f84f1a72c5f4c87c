//! # AI Organizer CLI (`aio`)
//!
//! Entry point for the catalog enrichment job.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aio init` | Create the warehouse database and product table |
//! | `aio enrich` | Batch task-array mode: enrich the item selected by `CLOUD_RUN_TASK_INDEX` |
//! | `aio serve` | Interactive HTTP mode (`POST /gen`) |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the warehouse
//! aio init --config ./config/aio.toml
//!
//! # Run one batch task (item 3 of the ITEMS array)
//! CLOUD_RUN_TASK_INDEX=3 ITEMS='[...]' aio enrich --config ./config/aio.toml
//!
//! # Start the HTTP service
//! aio serve --config ./config/aio.toml
//! ```
//!
//! Any enrichment failure — unreachable endpoint, model output that is
//! not the expected JSON, warehouse error — terminates the batch process
//! with a non-zero status and zero rows written.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use organizer::genai::HttpModel;
use organizer::server::{self, AppState};
use organizer::warehouse::Warehouse;
use organizer::{config, db, enrich, migrate};

/// AI Organizer enrichment job — one product image in, one structured
/// warehouse row out.
#[derive(Parser)]
#[command(
    name = "aio",
    about = "AI Organizer — catalog enrichment over a generative model",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/aio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the warehouse schema.
    ///
    /// Creates the SQLite database file and the product table. Idempotent.
    Init,

    /// Run one batch enrichment task.
    ///
    /// Picks `items[CLOUD_RUN_TASK_INDEX]` from the `ITEMS` environment
    /// variable (or `[job].items`), enriches it, and inserts exactly one
    /// row. Exits non-zero on any failure.
    Enrich,

    /// Start the interactive HTTP service.
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&config, &pool).await?;
            pool.close().await;
            println!("warehouse initialized: {}", config.warehouse.db_path.display());
        }
        Commands::Enrich => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&config, &pool).await?;
            let warehouse = Warehouse::new(pool, config.warehouse.table.clone());
            let model = HttpModel::new(&config.model)?;

            let outcome = enrich::run_batch(&config, &model, &warehouse).await?;
            println!("enriched {}", outcome.product_id);
            println!("  image: {}", outcome.image_uri);
            println!("ok");
        }
        Commands::Serve => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&config, &pool).await?;
            let warehouse = Arc::new(Warehouse::new(pool, config.warehouse.table.clone()));
            let model = Arc::new(HttpModel::new(&config.model)?);
            let state = AppState {
                config: Arc::new(config),
                model,
                warehouse,
            };
            server::run_server(state).await?;
        }
    }

    Ok(())
}
