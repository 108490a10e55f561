//! Broker topology constants.
//!
//! Queue arguments must match byte-for-byte on every process that
//! declares them -- RabbitMQ rejects a redeclaration with different
//! arguments with PRECONDITION_FAILED. Keeping them here is what makes
//! the declaration idempotent across the API service and the workers.

/// Queue the API service publishes [`JobMessage`](crate::JobMessage)s to.
pub const JOB_QUEUE: &str = "job_queue";

/// Queue the workers publish [`StatusMessage`](crate::StatusMessage)s to.
pub const STATUS_QUEUE: &str = "status_queue";

/// Direct exchange receiving everything expired or overflowed out of
/// [`JOB_QUEUE`].
pub const DLX_EXCHANGE: &str = "dlx_exchange";

/// Holds dead-lettered job messages for manual inspection. Nothing
/// consumes this automatically; operators must intervene.
pub const DEAD_LETTER_QUEUE: &str = "dead_letter_queue";

/// Job messages older than one hour are dead-lettered.
pub const JOB_QUEUE_TTL_MS: i64 = 3_600_000;

/// At most this many job messages may sit in the queue; overflow is
/// dead-lettered.
pub const JOB_QUEUE_MAX_LENGTH: i64 = 10_000;

/// Status messages older than 30 minutes are silently dropped. There is
/// no dead-letter routing for the status queue: if the status consumer
/// is down longer than this, the final outcome of a job is lost. Known
/// weak point, accepted.
pub const STATUS_QUEUE_TTL_MS: i64 = 1_800_000;
