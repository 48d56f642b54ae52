//! locate-from-db - run the geolocation engine over stored batches.
//!
//! Loads the calibration artifact, base map, and landmark table once,
//! then processes every selected batch with a pool of workers, writing
//! one region file per (batch, variant) into the output directory.
//!
//! Exit code 0 means every batch was processed, including batches whose
//! regions came out empty; only unusable startup resources (calibration,
//! base map, database, output directory) exit non-zero.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use error::CliError;
use tracing::info;

use rttlocate::calibration::CalibrationStore;
use rttlocate::db::{PgStore, RowSource};
use rttlocate::logging::init_logging;
use rttlocate::region::BaseMap;
use rttlocate::runner::{self, RunnerConfig, SharedState};

/// Environment variable consulted when no DSN argument is given.
const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Parser)]
#[command(name = "locate-from-db")]
#[command(version = rttlocate::VERSION)]
#[command(about = "Locate hosts from stored RTT measurement batches", long_about = None)]
struct Cli {
    /// Directory receiving one region file per (batch, variant)
    output_dir: PathBuf,

    /// Gzipped-JSON calibration artifact
    calibration_file: PathBuf,

    /// GeoJSON land polygon dataset
    basemap_file: PathBuf,

    /// Postgres DSN (default: the DATABASE_URL environment variable)
    database_dsn: Option<String>,

    /// Extra predicate appended to the batch selection query,
    /// e.g. WHERE proxied ORDER BY id
    #[arg(trailing_var_arg = true)]
    selector: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        e.exit();
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging().map_err(CliError::LoggingInit)?;

    let dsn = match cli.database_dsn {
        Some(dsn) => dsn,
        None => std::env::var(DATABASE_URL_ENV).map_err(|_| {
            CliError::Usage(format!(
                "no database DSN given and {DATABASE_URL_ENV} is not set"
            ))
        })?,
    };

    let mut config = RunnerConfig::new(cli.output_dir);
    if !cli.selector.is_empty() {
        config.selector = Some(cli.selector.join(" "));
    }

    info!(version = rttlocate::VERSION, "locate-from-db starting");
    let calibrations = CalibrationStore::load(&cli.calibration_file)?;
    info!(
        variants = calibrations.variant_tags().count(),
        "calibration loaded from {}",
        cli.calibration_file.display()
    );
    let basemap = BaseMap::load(&cli.basemap_file)?;

    // One connection per worker plus one for the coordinator.
    let store = PgStore::connect(&dsn, config.num_workers as u32 + 1).await?;
    let source: Arc<dyn RowSource> = Arc::new(store);
    let landmarks = source.landmarks().await?;
    info!(landmarks = landmarks.len(), "landmark table loaded");

    let shared = Arc::new(SharedState {
        landmarks,
        calibrations,
        basemap,
    });

    let summary = runner::run(source, shared, config).await?;
    info!(
        batches = summary.batches,
        outputs = summary.outputs,
        skipped = summary.skipped_batches,
        "all batches processed"
    );
    Ok(())
}
