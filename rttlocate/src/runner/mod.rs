//! Batch execution: worker pool, per-variant pipeline, output tagging.
//!
//! The coordinator loads all shared read-only state (landmark table,
//! calibration store, base map) before any worker starts, then feeds
//! batch ids through a channel to `N` workers. Each worker preprocesses
//! its batch once and runs every configured variant to completion,
//! writing one region file per (batch, variant). Results are reported in
//! completion order; a fatal error in any worker cancels the pool and
//! leaves already-written outputs in place.

mod config;
mod output;
#[cfg(test)]
mod tests;

pub use config::{default_num_workers, num_cpus, RunnerConfig, DEFAULT_VARIANTS, NUM_WORKERS_ENV};
pub use output::{
    region_file_name, write_region, OutputError, OUTPUT_EXT, TAG_AT_SEA, TAG_EMPTY_INTERSECTION,
    TAG_NO_OBSERVATIONS,
};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::calibration::CalibrationStore;
use crate::constraint::{build_constraints, ConstraintSet};
use crate::db::{BatchMetadata, DbError, RowSource};
use crate::landmarks::LandmarkTable;
use crate::preprocess::{preprocess_batch, PreprocessedBatch};
use crate::region::{BaseMap, Region};
use crate::solver::{solve, Solution};

/// Read-only state shared by every worker.
#[derive(Debug)]
pub struct SharedState {
    pub landmarks: LandmarkTable,
    pub calibrations: CalibrationStore,
    pub basemap: BaseMap,
}

/// Fatal runner errors. Everything else is handled per batch.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

/// Counters for one finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Batches fully processed.
    pub batches: usize,
    /// Region files written.
    pub outputs: usize,
    /// Batches skipped after a repeated database error.
    pub skipped_batches: usize,
}

/// How one batch ended, reported in completion order.
#[derive(Debug)]
enum BatchReport {
    Done { batch_id: i64, files: Vec<PathBuf> },
    Skipped { batch_id: i64 },
    Fatal { batch_id: i64, error: RunnerError },
}

/// Run the engine over every selected batch.
///
/// Returns counters on success. Fails fast on startup resource problems
/// (output directory, batch listing) and on worker-fatal errors (region
/// file writes); per-batch database errors are retried once and then
/// skipped.
pub async fn run(
    source: Arc<dyn RowSource>,
    shared: Arc<SharedState>,
    config: RunnerConfig,
) -> Result<RunSummary, RunnerError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| RunnerError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

    let batch_ids = source.batch_ids(config.selector.as_deref()).await?;
    info!(
        batches = batch_ids.len(),
        workers = config.num_workers,
        variants = config.variants.len(),
        "starting run"
    );

    let cancel = CancellationToken::new();
    let (batch_tx, batch_rx) = mpsc::channel::<i64>(config.num_workers.max(1) * 2);
    let batch_rx = Arc::new(Mutex::new(batch_rx));
    let (report_tx, mut report_rx) = mpsc::channel::<BatchReport>(config.num_workers.max(1) * 2);

    let mut workers = JoinSet::new();
    for worker_id in 0..config.num_workers.max(1) {
        let worker = Worker {
            id: worker_id,
            source: Arc::clone(&source),
            shared: Arc::clone(&shared),
            config: config.clone(),
            cancel: cancel.child_token(),
        };
        let rx = Arc::clone(&batch_rx);
        let tx = report_tx.clone();
        workers.spawn(async move { worker.run(rx, tx).await });
    }
    drop(report_tx);

    let feeder_cancel = cancel.clone();
    let feeder = tokio::spawn(async move {
        for id in batch_ids {
            if feeder_cancel.is_cancelled() {
                break;
            }
            if batch_tx.send(id).await.is_err() {
                break;
            }
        }
    });

    let mut summary = RunSummary::default();
    let mut fatal: Option<RunnerError> = None;
    while let Some(report) = report_rx.recv().await {
        match report {
            BatchReport::Done { batch_id, files } => {
                info!(batch = batch_id, files = files.len(), "batch complete");
                summary.batches += 1;
                summary.outputs += files.len();
            }
            BatchReport::Skipped { batch_id } => {
                warn!(batch = batch_id, "batch skipped after repeated database error");
                summary.skipped_batches += 1;
            }
            BatchReport::Fatal { batch_id, error } => {
                error!(batch = batch_id, %error, "fatal error; cancelling remaining workers");
                cancel.cancel();
                if fatal.is_none() {
                    fatal = Some(error);
                }
            }
        }
    }

    let _ = feeder.await;
    while let Some(joined) = workers.join_next().await {
        if let Err(join_error) = joined {
            let error = RunnerError::WorkerPanic(join_error.to_string());
            error!(%error, "worker task failed");
            if fatal.is_none() {
                fatal = Some(error);
            }
        }
    }

    match fatal {
        Some(error) => Err(error),
        None => {
            info!(
                batches = summary.batches,
                outputs = summary.outputs,
                skipped = summary.skipped_batches,
                "run complete"
            );
            Ok(summary)
        }
    }
}

struct Worker {
    id: usize,
    source: Arc<dyn RowSource>,
    shared: Arc<SharedState>,
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, batches: Arc<Mutex<mpsc::Receiver<i64>>>, reports: mpsc::Sender<BatchReport>) {
        loop {
            let batch_id = {
                let mut rx = batches.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    id = rx.recv() => id,
                }
            };
            let Some(batch_id) = batch_id else { return };

            let report = match self.process_batch(batch_id).await {
                Ok(files) => BatchReport::Done { batch_id, files },
                Err(WorkerError::Db(first)) => {
                    warn!(
                        worker = self.id,
                        batch = batch_id,
                        error = %first,
                        "database error; retrying batch once"
                    );
                    match self.process_batch(batch_id).await {
                        Ok(files) => BatchReport::Done { batch_id, files },
                        Err(WorkerError::Db(_)) => BatchReport::Skipped { batch_id },
                        Err(WorkerError::Fatal(error)) => BatchReport::Fatal { batch_id, error },
                    }
                }
                Err(WorkerError::Fatal(error)) => BatchReport::Fatal { batch_id, error },
            };
            let is_fatal = matches!(report, BatchReport::Fatal { .. });
            if reports.send(report).await.is_err() || is_fatal {
                return;
            }
        }
    }

    /// Preprocess one batch and run every configured variant.
    async fn process_batch(&self, batch_id: i64) -> Result<Vec<PathBuf>, WorkerError> {
        let metadata = self.source.batch_metadata(batch_id).await?;
        let rows = self.source.measurements(batch_id).await?;
        let batch = preprocess_batch(metadata, rows, &self.shared.landmarks);

        let mut files = Vec::with_capacity(self.config.variants.len());
        for variant in &self.config.variants {
            let constraints = build_constraints(
                &batch,
                &self.shared.landmarks,
                &self.shared.calibrations,
                variant,
            );
            let path = self.write_variant(&batch, variant, &constraints).await?;
            files.push(path);
        }
        Ok(files)
    }

    /// Solve one variant, classify the outcome, and write its file.
    async fn write_variant(
        &self,
        batch: &PreprocessedBatch,
        variant: &str,
        constraints: &ConstraintSet,
    ) -> Result<PathBuf, WorkerError> {
        let mut metadata = batch.metadata.clone();
        metadata.annotate("variant", variant);
        metadata.annotate("num_landmarks", constraints.len() as u64);
        metadata.annotate(
            "num_landmarks_skipped",
            (constraints.skipped_uncalibrated + constraints.skipped_numeric) as u64,
        );

        if constraints.is_empty() {
            let path = write_region(
                &self.config.output_dir,
                TAG_NO_OBSERVATIONS,
                batch.metadata.id,
                &Region::empty(),
                &metadata,
            )
            .await
            .map_err(RunnerError::from)
            .map_err(WorkerError::Fatal)?;
            return Ok(path);
        }

        let solution = solve(constraints, &Region::map_rectangle());
        let (tag, region) = classify(&solution, &self.shared.basemap, &mut metadata, variant);
        if let Some((lon, lat)) = region.centroid() {
            metadata.annotate("centroid_lon", lon);
            metadata.annotate("centroid_lat", lat);
        }

        let path = write_region(
            &self.config.output_dir,
            tag,
            batch.metadata.id,
            &region,
            &metadata,
        )
        .await
        .map_err(RunnerError::from)
        .map_err(WorkerError::Fatal)?;
        Ok(path)
    }
}

/// Decide the output tag and final region for one solved variant.
///
/// Physically inconsistent measurements (the physical-limit pass could
/// not keep every disk) mean there is no feasible subset at all; the
/// batch is published empty. Otherwise the region is clipped to land,
/// falling back to the unclipped "at sea" region when no land survives.
fn classify<'a>(
    solution: &Solution,
    basemap: &BaseMap,
    metadata: &mut BatchMetadata,
    variant: &'a str,
) -> (&'a str, Region) {
    metadata.annotate("included_disks", format!("{:#x}", solution.included));
    metadata.annotate("num_disks_included", solution.cardinality as u64);

    if solution.physical_selected < solution.physical_total {
        metadata.annotate("on_land", false);
        return (TAG_EMPTY_INTERSECTION, Region::empty());
    }

    let on_land = solution.region.intersection(basemap.land());
    if !on_land.is_empty() {
        metadata.annotate("on_land", true);
        (variant, on_land)
    } else if !solution.region.is_empty() {
        metadata.annotate("on_land", false);
        (TAG_AT_SEA, solution.region.clone())
    } else {
        metadata.annotate("on_land", false);
        (TAG_EMPTY_INTERSECTION, Region::empty())
    }
}

/// Worker-internal error split: database errors are retryable, the rest
/// cancel the run.
#[derive(Debug, Error)]
enum WorkerError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Fatal(RunnerError),
}
