//! `plugrid-broker` -- RabbitMQ plumbing for the job dispatch pipeline.
//!
//! Owns the AMQP side of the worker: connection establishment, the
//! durable queue topology, the status publisher each executor writes
//! through, and the prefetch-1 job consumer loop.
//!
//! Connections are constructed explicitly and passed to their owners;
//! there is no ambient/global broker state.

pub mod connection;
pub mod consumer;
pub mod publisher;
pub mod topology;

pub use connection::{connect, BrokerError};
pub use consumer::{consume_jobs, decide_delivery, Disposition, DispatchRejected, JobSink};
pub use publisher::{StatusPublisher, StatusSink};
