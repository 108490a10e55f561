//! Single-job plugin execution.
//!
//! One [`PluginExecutor`] handles one job at a time: publish
//! `processing`, run the container, classify the result, publish
//! exactly one terminal status. Failures never propagate upward --
//! everything past dispatch is reported through the status queue.

use std::sync::Arc;

use async_trait::async_trait;

use plugrid_broker::StatusSink;
use plugrid_core::{JobMessage, StatusMessage};
use plugrid_runtime::{ExecutionOutcome, PluginRuntime};

/// Anything a pool slot can run. Implemented by [`PluginExecutor`];
/// tests substitute recording handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: JobMessage);
}

/// Executes plugin jobs and reports their outcome.
///
/// Owns its own [`StatusSink`] (in production, a publisher with a
/// dedicated broker connection) so publishing is independent of the
/// other executors.
pub struct PluginExecutor<R, S> {
    slot: usize,
    runtime: Arc<R>,
    publisher: S,
}

impl<R, S> PluginExecutor<R, S>
where
    R: PluginRuntime,
    S: StatusSink,
{
    pub fn new(slot: usize, runtime: Arc<R>, publisher: S) -> Self {
        Self {
            slot,
            runtime,
            publisher,
        }
    }

    /// Run one job to completion and publish its status updates.
    ///
    /// Never returns an error: a runtime failure becomes a terminal
    /// `failed` status, and a publish failure is logged (if the broker
    /// is down, the terminal publish is attempted regardless).
    pub async fn execute(&self, job: JobMessage) {
        let job_id = job.job_id;
        tracing::info!(
            job_id,
            slot = self.slot,
            image = %job.docker_image_url,
            "Executing plugin",
        );

        self.publish(StatusMessage::processing(job_id)).await;

        let input_json = job.input_data.to_string();
        let terminal = match self
            .runtime
            .run_plugin(&job.docker_image_url, &input_json)
            .await
        {
            Ok(outcome) => {
                let status = classify_outcome(job_id, &outcome);
                tracing::info!(
                    job_id,
                    slot = self.slot,
                    exit_code = outcome.exit_code,
                    status = ?status.status,
                    "Plugin run finished",
                );
                status
            }
            Err(e) => {
                tracing::error!(job_id, slot = self.slot, error = %e, "Container runtime error");
                StatusMessage::failed(job_id, e.to_string())
            }
        };

        self.publish(terminal).await;
    }

    async fn publish(&self, message: StatusMessage) {
        if let Err(e) = self.publisher.publish(&message).await {
            tracing::error!(
                job_id = message.job_id,
                status = ?message.status,
                error = %e,
                "Failed to publish status update",
            );
        }
    }
}

#[async_trait]
impl<R, S> JobHandler for PluginExecutor<R, S>
where
    R: PluginRuntime,
    S: StatusSink,
{
    async fn handle(&self, job: JobMessage) {
        self.execute(job).await;
    }
}

/// Map a finished container run to its terminal status.
///
/// - exit 0 and the log output parses as JSON: `completed` with the
///   parsed value as the result.
/// - exit 0 but unparseable output: `failed`, with the raw logs quoted
///   in the error message.
/// - nonzero exit: `failed` with the raw logs as the error message.
pub fn classify_outcome(job_id: i64, outcome: &ExecutionOutcome) -> StatusMessage {
    let logs = outcome.logs();

    if !outcome.succeeded() {
        return StatusMessage::failed(job_id, logs);
    }

    match serde_json::from_str::<serde_json::Value>(&logs) {
        Ok(result) => StatusMessage::completed(job_id, result),
        Err(_) => StatusMessage::failed(job_id, format!("Invalid JSON output: {logs}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plugrid_core::JobStatus;

    fn outcome(exit_code: i64, stdout: &str, stderr: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn zero_exit_with_json_output_completes() {
        let status = classify_outcome(42, &outcome(0, "{\"prediction\":\"class_A\"}", ""));
        assert_eq!(status.job_id, 42);
        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(
            status.result.as_ref().unwrap()["prediction"],
            "class_A"
        );
        assert!(status.error_message.is_none());
    }

    #[test]
    fn zero_exit_with_invalid_json_fails_with_raw_output() {
        let status = classify_outcome(42, &outcome(0, "oops", ""));
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(
            status.error_message.as_deref(),
            Some("Invalid JSON output: oops")
        );
        assert!(status.result.is_none());
    }

    #[test]
    fn nonzero_exit_fails_with_logs() {
        let status = classify_outcome(42, &outcome(1, "", "boom"));
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn nonzero_exit_with_json_output_still_fails() {
        // Exit code wins over parseable output.
        let status = classify_outcome(42, &outcome(2, "{\"partial\":true}", ""));
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error_message.as_deref(), Some("{\"partial\":true}"));
    }
}
