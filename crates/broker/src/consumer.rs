//! Job queue consumer loop.
//!
//! Runs with prefetch 1 so at most one unacknowledged delivery is in
//! flight per worker process, which keeps distribution fair across
//! processes and bounds memory. Dispatch is fire-and-forget: the
//! message is acked as soon as it is handed to an executor slot, not
//! when the job finishes. An executor crash therefore loses the
//! in-flight job without redelivery -- deliberate at-most-once
//! semantics past the dispatch point.

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Channel;

use plugrid_core::{queues, JobMessage};

use crate::connection::BrokerError;

/// Destination for validated job messages. Implemented by the executor
/// pool; dispatch must not block on job completion.
pub trait JobSink: Send + Sync {
    /// Hand the job off for asynchronous execution.
    ///
    /// Returns the executor slot index the job was assigned to.
    fn dispatch(&self, job: JobMessage) -> Result<usize, DispatchRejected>;
}

/// The sink could not accept the job (an executor slot has shut down).
/// Transient from the consumer's perspective: the delivery is requeued.
#[derive(Debug, thiserror::Error)]
#[error("Executor pool rejected the job")]
pub struct DispatchRejected;

/// What to do with a delivery after attempting dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Dispatched; acknowledge immediately.
    Ack,
    /// Poison message; reject without requeue so it cannot loop forever.
    Drop,
    /// Transient failure; reject with requeue for redelivery.
    Requeue,
}

/// Decide the fate of one raw delivery.
///
/// Pure with respect to the broker: parsing, validation, and the
/// dispatch attempt happen here, the caller performs the matching
/// ack/nack.
pub fn decide_delivery<S: JobSink + ?Sized>(sink: &S, payload: &[u8]) -> Disposition {
    let job = match JobMessage::from_payload(payload) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed job message");
            return Disposition::Drop;
        }
    };

    let job_id = job.job_id;
    match sink.dispatch(job) {
        Ok(slot) => {
            tracing::info!(job_id, slot, "Job dispatched");
            Disposition::Ack
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Dispatch failed, requeueing");
            Disposition::Requeue
        }
    }
}

/// Consume `job_queue` until the channel dies.
///
/// Always returns an error: either a channel operation failed or the
/// delivery stream ended ([`BrokerError::ConsumerEnded`]); both mean
/// the channel is unusable and the caller should treat them as fatal.
/// Unacked deliveries are redelivered by the broker once the channel
/// closes, so a crash mid-decision cannot lose a message that was not
/// yet dispatched.
pub async fn consume_jobs<S: JobSink + ?Sized>(
    channel: &Channel,
    consumer_tag: &str,
    sink: &S,
) -> Result<(), BrokerError> {
    channel.basic_qos(1, BasicQosOptions::default()).await?;

    let mut consumer = channel
        .basic_consume(
            queues::JOB_QUEUE,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::info!(queue = queues::JOB_QUEUE, "Consuming jobs");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;

        match decide_delivery(sink, &delivery.data) {
            Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
            Disposition::Drop => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    })
                    .await?
            }
            Disposition::Requeue => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?
            }
        }
    }

    tracing::warn!("Job consumer stream ended");
    Err(BrokerError::ConsumerEnded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
