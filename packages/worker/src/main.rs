#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the tile resolution worker.

use clap::{Parser, Subcommand};
use tile_locator_geocoder::{Geocoder, Resolution};
use tile_locator_tile_models::GeoTile;
use tile_locator_worker::{
    GeocoderSettings, Worker, WorkerConfig, config, geocoder_from_settings, http_client,
};
use tokio::time::Instant;

#[derive(Parser)]
#[command(
    name = "tile_locator_worker",
    about = "Resolves queued map tiles to administrative locations"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the queue until the restart interval elapses (default)
    Run {
        /// Process a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Geocode one tile and print the location as JSON, without touching
    /// the queue or the tile store
    Resolve {
        /// Tile identifier (e.g. `12_1234_2345`)
        tile_id: String,
    },
    /// Print the center coordinate of a tile
    Center {
        /// Tile identifier (e.g. `12_1234_2345`)
        tile_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once } => {
            let config = WorkerConfig::from_env()?;
            let worker = Worker::from_config(&config)?;

            if once {
                let cycle = worker.run_cycle().await;
                log::info!("{:?}", cycle.outcome);
                return Ok(());
            }

            log::info!(
                "Starting worker, restarting after {:?}",
                config.restart_interval
            );
            let stats = worker
                .run_until(Instant::now() + config.restart_interval)
                .await;
            log::info!("Restart interval reached after {stats}; exiting");
        }
        Commands::Resolve { tile_id } => {
            let tile = GeoTile::parse(&tile_id)?;
            log::info!("Resolving tile {tile}");
            let coordinate = tile.center();
            let settings = GeocoderSettings::from_env()?;
            let client = http_client(config::http_timeout(|name| std::env::var(name).ok())?)?;
            let geocoder = geocoder_from_settings(client, &settings);

            match geocoder.resolve(coordinate).await {
                Resolution::Located(location) => {
                    println!("{}", serde_json::to_string_pretty(&location)?);
                }
                Resolution::RetryAfter { cause, delay } => {
                    return Err(format!(
                        "Tile {tile} not resolved: {cause} (retry in {delay:?})"
                    )
                    .into());
                }
            }
        }
        Commands::Center { tile_id } => {
            let tile = GeoTile::parse(&tile_id)?;
            println!("{tile}: {}", serde_json::to_string_pretty(&tile.center())?);
        }
    }

    Ok(())
}

/// Logs at `info` unless `RUST_LOG` says otherwise.
fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}
