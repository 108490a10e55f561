//! Fixed-size round-robin executor pool.
//!
//! Each slot is a single-consumer channel drained by one dedicated
//! task, so a slot processes at most one job at a time and the pool
//! bounds in-flight container executions at its size. Dispatch is
//! fire-and-forget; jobs queue inside a slot's channel if it is busy.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use plugrid_broker::{DispatchRejected, JobSink};
use plugrid_core::JobMessage;

use crate::executor::JobHandler;

/// Fan-out over a fixed set of job handlers.
///
/// The pool size is fixed at spawn time and never changes. The
/// round-robin counter is the only shared mutable state between
/// dispatches; slot `counter % size` gets each job in sequence,
/// independent of job content.
pub struct ExecutorPool {
    slots: Vec<mpsc::UnboundedSender<JobMessage>>,
    next: AtomicUsize,
}

impl ExecutorPool {
    /// Spawn one drain task per handler and return the pool.
    ///
    /// `handlers` must be non-empty; its length is the pool size.
    pub fn spawn<H>(handlers: Vec<H>) -> Self
    where
        H: JobHandler + 'static,
    {
        assert!(!handlers.is_empty(), "executor pool requires at least one handler");

        let mut slots = Vec::with_capacity(handlers.len());
        for (slot, handler) in handlers.into_iter().enumerate() {
            let (tx, mut rx) = mpsc::unbounded_channel::<JobMessage>();
            slots.push(tx);

            tokio::spawn(async move {
                // One job at a time per slot: the next recv happens
                // only after the previous handle() returns.
                while let Some(job) = rx.recv().await {
                    handler.handle(job).await;
                }
                tracing::debug!(slot, "Executor slot shut down");
            });
        }

        Self {
            slots,
            next: AtomicUsize::new(0),
        }
    }

    /// Number of executor slots.
    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

impl JobSink for ExecutorPool {
    fn dispatch(&self, job: JobMessage) -> Result<usize, DispatchRejected> {
        // The counter advances only after a successful hand-off, so a
        // requeued redelivery retries the same slot instead of
        // silently skipping it. The consumer is the sole dispatcher,
        // which makes the separate load and increment safe.
        let slot = self.next.load(Ordering::Relaxed) % self.slots.len();
        self.slots[slot].send(job).map_err(|_| DispatchRejected)?;
        self.next.fetch_add(1, Ordering::Relaxed);
        Ok(slot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
