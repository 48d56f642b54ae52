//! Runner configuration: defaults and environment overrides.

use std::path::PathBuf;

use tracing::warn;

/// Variant tags of the reference configuration, run in this order.
pub const DEFAULT_VARIANTS: [&str; 4] = ["cbg-m-1", "oct-m-1", "spo-m-a", "spo-g-a"];

/// Environment variable overriding the worker pool size.
pub const NUM_WORKERS_ENV: &str = "NUM_WORKERS";

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default worker pool size: one worker per logical core, unless
/// `NUM_WORKERS` overrides it. Invalid or zero overrides are ignored
/// with a warning.
pub fn default_num_workers() -> usize {
    let default = num_cpus();
    match std::env::var(NUM_WORKERS_ENV) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!(
                    requested = %raw,
                    default,
                    "ignoring invalid {NUM_WORKERS_ENV} override"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Settings for one engine run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory receiving one region file per (batch, variant).
    pub output_dir: PathBuf,
    /// Variant tags to run for every batch.
    pub variants: Vec<String>,
    /// Worker pool size.
    pub num_workers: usize,
    /// Optional SQL fragment appended to the batch selection query.
    pub selector: Option<String>,
}

impl RunnerConfig {
    /// Configuration with the reference variants and a worker per core.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
            num_workers: default_num_workers(),
            selector: None,
        }
    }
}
