//! `plugrid-core` -- wire types and queue policy shared by every
//! plugrid process.
//!
//! Holds the job/status message definitions and the broker topology
//! constants. Zero internal dependencies so that both the worker and
//! any publishing service can depend on it.

pub mod message;
pub mod queues;

pub use message::{JobMessage, JobStatus, MessageError, StatusMessage};
