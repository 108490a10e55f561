//! Captured result of one container run.

/// Exit code and output of a finished plugin container.
///
/// Consumed immediately by the executor to build a status message and
/// then discarded; never persisted.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// The container's exit code.
    pub exit_code: i64,

    /// Text captured from the container's stdout stream.
    pub stdout: String,

    /// Text captured from the container's stderr stream.
    pub stderr: String,
}

impl ExecutionOutcome {
    /// Whether the container exited successfully.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined log output in stream order as Docker reports it
    /// (stdout first, then stderr). Plugins emit their JSON result on
    /// stdout; classification and failure reporting both work on this
    /// combined text.
    pub fn logs(&self) -> String {
        let mut combined = self.stdout.clone();
        combined.push_str(&self.stderr);
        combined
    }
}
