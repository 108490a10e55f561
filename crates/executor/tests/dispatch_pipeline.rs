//! End-to-end dispatch tests: raw queue payload through delivery
//! decision, round-robin pool, executor, and status publishing --
//! with the broker and Docker daemon replaced by in-memory fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use plugrid_broker::{decide_delivery, BrokerError, Disposition, StatusSink};
use plugrid_core::{JobStatus, StatusMessage};
use plugrid_executor::{ExecutorPool, PluginExecutor};
use plugrid_runtime::{ExecutionOutcome, PluginRuntime, RuntimeError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Runtime that replays a scripted outcome per image.
struct ScriptedRuntime {
    outcomes: Mutex<HashMap<String, ScriptedResult>>,
}

enum ScriptedResult {
    Exit(i64, &'static str, &'static str),
    Fail,
}

impl ScriptedRuntime {
    fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    fn script(self, image: &str, result: ScriptedResult) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(image.to_string(), result);
        self
    }
}

#[async_trait]
impl PluginRuntime for ScriptedRuntime {
    async fn run_plugin(
        &self,
        image: &str,
        _input_json: &str,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        match self.outcomes.lock().unwrap().get(image) {
            Some(ScriptedResult::Exit(code, stdout, stderr)) => Ok(ExecutionOutcome {
                exit_code: *code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
            Some(ScriptedResult::Fail) | None => Err(RuntimeError::WaitEnded),
        }
    }
}

/// Status sink that forwards every publish to a collector channel.
struct CollectingSink {
    tx: mpsc::UnboundedSender<StatusMessage>,
}

#[async_trait]
impl StatusSink for CollectingSink {
    async fn publish(&self, message: &StatusMessage) -> Result<(), BrokerError> {
        let _ = self.tx.send(message.clone());
        Ok(())
    }
}

fn pipeline(
    runtime: ScriptedRuntime,
    pool_size: usize,
) -> (ExecutorPool, mpsc::UnboundedReceiver<StatusMessage>) {
    let runtime = Arc::new(runtime);
    let (tx, rx) = mpsc::unbounded_channel();

    let executors: Vec<_> = (0..pool_size)
        .map(|slot| {
            PluginExecutor::new(
                slot,
                Arc::clone(&runtime),
                CollectingSink { tx: tx.clone() },
            )
        })
        .collect();

    (ExecutorPool::spawn(executors), rx)
}

fn payload(job_id: i64, image: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "job_id": job_id,
        "docker_image_url": image,
        "input_data": {"features": [1, 2, 3]},
    }))
    .unwrap()
}

async fn next_status(rx: &mut mpsc::UnboundedReceiver<StatusMessage>) -> StatusMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("status should arrive")
        .expect("sink channel should stay open")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_run_publishes_processing_then_completed() {
    let runtime = ScriptedRuntime::new().script(
        "img:1.0",
        ScriptedResult::Exit(0, "{\"prediction\":\"class_A\"}", ""),
    );
    let (pool, mut rx) = pipeline(runtime, 5);

    assert_eq!(
        decide_delivery(&pool, &payload(42, "img:1.0")),
        Disposition::Ack
    );

    let first = next_status(&mut rx).await;
    assert_eq!(first.job_id, 42);
    assert_eq!(first.status, JobStatus::Processing);

    let terminal = next_status(&mut rx).await;
    assert_eq!(terminal.job_id, 42);
    assert_eq!(terminal.status, JobStatus::Completed);
    assert_eq!(terminal.result.unwrap()["prediction"], "class_A");
}

#[tokio::test]
async fn nonzero_exit_publishes_failed_with_logs() {
    let runtime = ScriptedRuntime::new().script("img:1.0", ScriptedResult::Exit(1, "", "boom"));
    let (pool, mut rx) = pipeline(runtime, 1);

    assert_eq!(
        decide_delivery(&pool, &payload(42, "img:1.0")),
        Disposition::Ack
    );

    assert_eq!(next_status(&mut rx).await.status, JobStatus::Processing);

    let terminal = next_status(&mut rx).await;
    assert_eq!(terminal.status, JobStatus::Failed);
    assert_eq!(terminal.error_message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn invalid_json_output_publishes_failed_with_prefix() {
    let runtime = ScriptedRuntime::new().script("img:1.0", ScriptedResult::Exit(0, "oops", ""));
    let (pool, mut rx) = pipeline(runtime, 1);

    decide_delivery(&pool, &payload(42, "img:1.0"));

    assert_eq!(next_status(&mut rx).await.status, JobStatus::Processing);

    let terminal = next_status(&mut rx).await;
    assert_eq!(terminal.status, JobStatus::Failed);
    assert_eq!(
        terminal.error_message.as_deref(),
        Some("Invalid JSON output: oops")
    );
}

#[tokio::test]
async fn runtime_failure_still_yields_exactly_one_terminal_status() {
    let runtime = ScriptedRuntime::new().script("img:broken", ScriptedResult::Fail);
    let (pool, mut rx) = pipeline(runtime, 1);

    decide_delivery(&pool, &payload(7, "img:broken"));

    assert_eq!(next_status(&mut rx).await.status, JobStatus::Processing);

    let terminal = next_status(&mut rx).await;
    assert_eq!(terminal.job_id, 7);
    assert_eq!(terminal.status, JobStatus::Failed);
    assert!(terminal.error_message.is_some());

    // Nothing further for this job.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "no status after the terminal one");
}

#[tokio::test]
async fn malformed_message_is_dropped_and_never_executes() {
    let runtime = ScriptedRuntime::new();
    let (pool, mut rx) = pipeline(runtime, 1);

    // Missing docker_image_url.
    let bad = serde_json::to_vec(&serde_json::json!({
        "job_id": 42,
        "input_data": {},
    }))
    .unwrap();

    assert_eq!(decide_delivery(&pool, &bad), Disposition::Drop);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        rx.try_recv().is_err(),
        "a dropped message must not produce any status update"
    );
}

#[tokio::test]
async fn jobs_spread_over_the_pool_in_submission_order() {
    let runtime = ScriptedRuntime::new().script("img:1.0", ScriptedResult::Exit(0, "{}", ""));
    let (pool, mut rx) = pipeline(runtime, 5);

    for i in 0..12 {
        assert_eq!(
            decide_delivery(&pool, &payload(i, "img:1.0")),
            Disposition::Ack
        );
    }

    // 12 jobs, two statuses each.
    let mut terminals = 0;
    for _ in 0..24 {
        if next_status(&mut rx).await.status.is_terminal() {
            terminals += 1;
        }
    }
    assert_eq!(terminals, 12);
}
