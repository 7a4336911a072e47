mod locate;
mod nearby;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "labgeo-cli")]
#[command(about = "Find diagnostic labs near you")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Acquire the current location, resolve it and cache it.
    Locate {
        /// Latitude of a fix the device already has.
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude of a fix the device already has.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Accuracy radius of the fix in metres.
        #[arg(long, requires = "lat")]
        accuracy: Option<f64>,
        /// Do not fall back to IP-based approximate location.
        #[arg(long)]
        no_fallback: bool,
    },
    /// List labs sorted by distance.
    Nearby {
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Only show labs within this many kilometres.
        #[arg(long)]
        radius_km: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
        /// Only show labs offering a test whose name contains this text.
        #[arg(long)]
        test: Option<String>,
    },
    /// Inspect or forget the cached location.
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },
}

#[derive(Debug, Subcommand)]
enum LocationCommands {
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = labgeo_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Locate {
            lat,
            lng,
            accuracy,
            no_fallback,
        }) => {
            let fix = lat.zip(lng).map(|(lat, lng)| (lat, lng, accuracy));
            locate::run_locate(&config, fix, no_fallback).await?;
        }
        Some(Commands::Nearby {
            lat,
            lng,
            radius_km,
            limit,
            test,
        }) => {
            let query = nearby::NearbyQuery {
                origin: lat.zip(lng),
                radius_km,
                limit: limit.unwrap_or(config.nearby_default_limit),
                test,
            };
            nearby::run_nearby(&config, &query)?;
        }
        Some(Commands::Location {
            command: LocationCommands::Show,
        }) => locate::run_location_show(&config),
        Some(Commands::Location {
            command: LocationCommands::Clear,
        }) => locate::run_location_clear(&config)?,
        None => println!("labgeo-cli: try `labgeo-cli --help`"),
    }

    Ok(())
}
