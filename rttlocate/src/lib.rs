//! rttlocate - Active geolocation from round-trip-time measurements
//!
//! Given RTT measurements from an unknown host to landmarks of known
//! latitude/longitude, this library produces a geographic region that
//! plausibly contains the host. It is designed to run offline against a
//! database of previously collected measurement batches; each batch yields
//! one region per configured calibration variant.
//!
//! # Pipeline
//!
//! ```text
//! database rows ──> preprocess ──> constraint ──> solver ──> output region
//!                      │              │             │
//!                 proxy-RTT      disks on the   max-feasible
//!                 subtraction      globe       subset search
//! ```
//!
//! Shared read-only state (landmark table, calibration store, base map) is
//! loaded once by the coordinator and distributed to workers; see
//! [`runner`] for the execution model.

pub mod calibration;
pub mod constraint;
pub mod db;
pub mod disk;
pub mod geodesic;
pub mod landmarks;
pub mod logging;
pub mod preprocess;
pub mod region;
pub mod runner;
pub mod solver;

/// Version of the rttlocate library and CLI.
///
/// Synchronized across the workspace; injected from `Cargo.toml` at
/// compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
