//! Cluster status aggregation for Slurm: runs the inspection commands,
//! parses their tables, joins node inventory with job allocations and
//! publishes the result as immutable snapshots.

pub mod extract;
pub mod metrics;
pub mod reconcile;
pub mod records;
pub mod refresh;
pub mod runner;
pub mod table;

pub use metrics::RefreshMetrics;
pub use reconcile::{reconcile, Reconciliation};
pub use refresh::{RefreshConfig, RefreshHandle, RefreshScheduler};
pub use runner::{CommandRunner, CommandSpec, InspectionCommands, ProcessRunner};
