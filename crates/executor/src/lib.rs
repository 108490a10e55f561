//! `plugrid-executor` -- plugin execution and the bounded worker pool.
//!
//! A [`PluginExecutor`] turns one job into container execution plus
//! status updates; the [`ExecutorPool`] fans jobs out round-robin over
//! a fixed set of executors, each processing one job at a time.

pub mod executor;
pub mod pool;

pub use executor::{classify_outcome, JobHandler, PluginExecutor};
pub use pool::ExecutorPool;
