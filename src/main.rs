//! # Listing Merge CLI (`lmerge`)
//!
//! The `lmerge` binary drives the listing reconciliation pipeline: it reads
//! the scraped per-source JSON files, merges them into one deduplicated file
//! per category, and reports on the results.
//!
//! ## Usage
//!
//! ```bash
//! lmerge --config ./config/listing-merge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lmerge run` | Merge every pending category |
//! | `lmerge categories` | List categories, their input files, and output status |
//! | `lmerge geocode "<address>"` | Resolve one address through the configured geocoder |
//! | `lmerge stats` | Summarize the output files already written |
//!
//! ## Examples
//!
//! ```bash
//! # Merge everything with the built-in source layout
//! lmerge --defaults run
//!
//! # Re-run a single category (delete its output first)
//! lmerge run --only terreno_venda --config ./config/listing-merge.toml
//!
//! # Machine-readable progress
//! lmerge run --progress json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use listing_merge::categories;
use listing_merge::config::{self, Config};
use listing_merge::geocode::{self, GeoContext, GeocodeSettings, Geocoder};
use listing_merge::pipeline;
use listing_merge::progress::ProgressMode;
use listing_merge::stats;

/// Listing Merge CLI: reconcile scraped real-estate listings into one
/// deduplicated dataset per category.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/listing-merge.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lmerge",
    about = "Listing Merge — reconcile scraped real-estate listings across sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/listing-merge.toml")]
    config: PathBuf,

    /// Use the built-in source and category layout instead of a config file.
    #[arg(long, global = true)]
    defaults: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge all pending categories.
    ///
    /// Categories whose output file already exists are skipped; delete the
    /// file to rebuild it.
    Run {
        /// Only run these categories (repeatable).
        #[arg(long)]
        only: Vec<String>,

        /// Progress output on stderr. Defaults to `human` on a terminal,
        /// otherwise `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// List categories with their per-source input files.
    Categories,

    /// Resolve one address and print the coordinate.
    Geocode {
        /// Free-text address, e.g. "Rua 10, Setor Oeste".
        address: String,
    },

    /// Summarize the output files already written.
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Human,
    Json,
    Off,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cfg = if cli.defaults {
        Config::default_pipeline()
    } else {
        config::load_config(&cli.config)?
    };

    match cli.command {
        Commands::Run { only, progress } => {
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            let resolver = geocode::create_resolver(&cfg.geocoding)?;
            let summary =
                pipeline::run_pipeline(&cfg, resolver, Arc::from(mode.reporter()), &only).await?;
            pipeline::print_summary(&summary, &cfg);
            if summary.failed() > 0 {
                anyhow::bail!("{} categories failed", summary.failed());
            }
        }
        Commands::Categories => {
            categories::list_categories(&cfg)?;
        }
        Commands::Geocode { address } => {
            let resolver = geocode::create_resolver(&cfg.geocoding)?;
            let geocoder = Geocoder::new(
                Arc::new(GeoContext::new(cfg.geocoding.warn_every)),
                resolver,
                GeocodeSettings::from_config(&cfg.geocoding),
            );
            let cleaned = geocode::clean_address(&address);
            println!("address: {}", cleaned);
            println!("query:   {}", geocoder.qualify(&cleaned));
            match geocoder.resolve(&address).await {
                Some(point) => println!("result:  {}, {}", point.latitude, point.longitude),
                None => println!("result:  not found"),
            }
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}
