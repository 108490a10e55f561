//! Job and status message wire types.
//!
//! Both queues carry JSON with persistent delivery mode. A
//! [`JobMessage`] is produced once per job by the API service; each job
//! yields one optional `processing` and exactly one terminal
//! [`StatusMessage`], correlated by `job_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobMessage
// ---------------------------------------------------------------------------

/// A unit of work pulled off the job queue.
///
/// `job_id`, `docker_image_url` and `input_data` are what the executor
/// actually needs; the remaining fields are informational and tolerated
/// missing so that a slightly older publisher does not poison the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    /// Unique id assigned by the API service when the job row is created.
    pub job_id: i64,

    /// Name of the plugin as registered in the plugin registry.
    #[serde(default)]
    pub plugin_name: String,

    /// Container image to run for this job.
    pub docker_image_url: String,

    /// Arbitrary JSON object handed to the plugin as its input.
    pub input_data: serde_json::Value,

    /// Id of the user that submitted the job.
    #[serde(default)]
    pub owner_id: i64,

    /// When the job row was created (UTC).
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl JobMessage {
    /// Parse a raw queue payload into a validated job message.
    ///
    /// This is the consumer's poison-message gate: anything rejected
    /// here must be dropped without requeue, or it would loop forever.
    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageError> {
        let job: JobMessage = serde_json::from_slice(payload)?;
        job.validate()?;
        Ok(job)
    }

    /// Check the fields the dispatch pipeline depends on.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.docker_image_url.is_empty() {
            return Err(MessageError::MissingField("docker_image_url"));
        }
        if !self.input_data.is_object() {
            return Err(MessageError::InvalidInputData);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StatusMessage
// ---------------------------------------------------------------------------

/// Lifecycle state reported for a job.
///
/// `Processing` is the only non-terminal state. The status consumer
/// treats later messages as authoritative overwrites keyed by `job_id`,
/// and must tolerate a terminal status arriving without a preceding
/// `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further status message follows for this job.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A status update published to the status queue.
///
/// `result` and `error_message` are mutually exclusive; the
/// constructors below are the only way this crate builds one, which
/// keeps that invariant out of the executor's hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub job_id: i64,
    pub status: JobStatus,

    /// Parsed plugin output. Present only for `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Human-readable failure description. Present only for `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When this update was produced (UTC).
    pub updated_at: DateTime<Utc>,
}

impl StatusMessage {
    fn new(job_id: i64, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            result: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// The job's container is about to run.
    pub fn processing(job_id: i64) -> Self {
        Self::new(job_id, JobStatus::Processing)
    }

    /// The container exited 0 and produced well-formed JSON output.
    pub fn completed(job_id: i64, result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..Self::new(job_id, JobStatus::Completed)
        }
    }

    /// Terminal failure. `error_message` carries raw container logs or
    /// the runtime error text; it is never retried.
    pub fn failed(job_id: i64, error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            ..Self::new(job_id, JobStatus::Failed)
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a queue payload could not be turned into a [`JobMessage`].
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was not valid JSON or was missing required fields.
    #[error("Malformed job message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required field was present but empty.
    #[error("Job message field `{0}` is missing or empty")]
    MissingField(&'static str),

    /// `input_data` was not a JSON object.
    #[error("Job message `input_data` must be a JSON object")]
    InvalidInputData,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
