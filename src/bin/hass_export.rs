//! hass-export - Home Assistant recorder to MySQL
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin hass-export -- energy --sqlite home-assistant_v2.db \
//!     --dsn 'user:pass@tcp(host:4000)/ha?tls=tidb' --entity office_plug
//! cargo run --release --bin hass-export -- gps --sqlite home-assistant_v2.db --dsn ...
//! ```
//!
//! ## Environment Variables
//!
//! - HASS_SQLITE_PATH - Recorder database path (fallback for --sqlite)
//! - MYSQL_DSN - MySQL DSN, URL or Go driver form (fallback for --dsn)
//! - ENERGY_ENTITY - Entity slug for the energy export (fallback for --entity)
//! - RECORDER_PAGE_SIZE - Rows per recorder page (default: 1000)
//! - RUST_LOG - Logging level (optional, default: info)
//!
//! Ctrl-C stops the export before the next page or batch is written.

use clap::{Args, Parser, Subcommand};
use hass_export::{export_energy, export_gps, EnergySyncConfig, GpsSyncConfig};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Export Home Assistant recorder data into MySQL / TiDB
#[derive(Parser)]
#[command(name = "hass-export", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export smart socket telemetry (power, voltage, current) into energy_points
    Energy {
        #[command(flatten)]
        source: SourceArgs,

        /// Entity slug to export; matches any entity id containing it
        #[arg(long, env = "ENERGY_ENTITY")]
        entity: String,
    },
    /// Export device tracker coordinates into gps_points
    Gps {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Path to the Home Assistant SQLite recorder database
    #[arg(long, env = "HASS_SQLITE_PATH")]
    sqlite: PathBuf,

    /// MySQL DSN, e.g. user:password@tcp(host:3306)/database
    #[arg(long, env = "MYSQL_DSN", hide_env_values = true)]
    dsn: String,

    /// Recorder rows fetched per page
    #[arg(long, env = "RECORDER_PAGE_SIZE", default_value_t = hass_export::recorder::DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env must be loaded before clap reads env fallbacks
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("🛑 Ctrl-C received, stopping export");
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Command::Energy { source, entity } => {
            let config = EnergySyncConfig {
                sqlite_path: source.sqlite,
                dsn: source.dsn,
                entity,
                page_size: source.page_size,
                ..Default::default()
            };

            log::info!("🚀 Starting energy export");
            log::info!("   Recorder: {}", config.sqlite_path.display());
            log::info!("   Entity slug: {}", config.entity);
            log::info!("   Page size: {}", config.page_size);
            log::info!("   Minute-averaged: {}", config.minute_average_tokens.join(", "));

            export_energy(&config, cancel).await.map(|_| ())
        }
        Command::Gps { source } => {
            let config = GpsSyncConfig {
                sqlite_path: source.sqlite,
                dsn: source.dsn,
                page_size: source.page_size,
            };

            log::info!("🚀 Starting GPS export");
            log::info!("   Recorder: {}", config.sqlite_path.display());
            log::info!("   Page size: {}", config.page_size);

            export_gps(&config, cancel).await.map(|_| ())
        }
    };

    if let Err(e) = &result {
        log::error!("❌ Export failed: {}", e);
    }
    result?;
    Ok(())
}
