//! `plugrid-runtime` -- container execution for plugin jobs.
//!
//! Runs one plugin image per job against the local Docker daemon,
//! blocks until exit, captures the output streams, and removes the
//! container on every path. There is deliberately no execution
//! timeout: a hung plugin occupies its executor slot until the
//! container exits (known design gap, see `docker.rs`).

pub mod docker;
pub mod outcome;

pub use docker::{DockerRuntime, RuntimeError};
pub use outcome::ExecutionOutcome;

use async_trait::async_trait;

/// Seam between the executor and the container runtime.
///
/// The production implementation is [`DockerRuntime`]; tests substitute
/// a scripted runtime so executor behavior can be verified without a
/// Docker daemon.
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    /// Run `image` with `input_json` as its single command argument and
    /// wait for it to exit.
    ///
    /// A nonzero exit code is a normal [`ExecutionOutcome`], not an
    /// error; `Err` means the run itself could not be carried out
    /// (image pull failure, daemon unreachable).
    async fn run_plugin(
        &self,
        image: &str,
        input_json: &str,
    ) -> Result<ExecutionOutcome, RuntimeError>;
}
