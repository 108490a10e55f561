//! Status publishing.
//!
//! Every executor owns one [`StatusPublisher`] with its own broker
//! connection, so a `processing` update never contends with another
//! executor's publishes. [`StatusSink`] is the seam the executor is
//! written against; tests substitute a recording sink.

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel, Connection};

use plugrid_core::{queues, StatusMessage};

use crate::connection::{self, BrokerError};

/// Destination for status updates.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Publish one status update for a job.
    async fn publish(&self, message: &StatusMessage) -> Result<(), BrokerError>;
}

/// Publishes [`StatusMessage`]s to the status queue as persistent
/// `application/json` deliveries via the default exchange.
pub struct StatusPublisher {
    // Held so the connection lives exactly as long as the publisher.
    _connection: Connection,
    channel: Channel,
}

impl StatusPublisher {
    /// Open a dedicated connection and channel for status publishing.
    pub async fn connect(amqp_url: &str) -> Result<Self, BrokerError> {
        let connection = connection::connect(amqp_url).await?;
        let channel = connection.create_channel().await?;
        Ok(Self {
            _connection: connection,
            channel,
        })
    }
}

#[async_trait]
impl StatusSink for StatusPublisher {
    async fn publish(&self, message: &StatusMessage) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(message)?;

        self.channel
            .basic_publish(
                "",
                queues::STATUS_QUEUE,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // persistent
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;

        tracing::debug!(
            job_id = message.job_id,
            status = ?message.status,
            "Status update published",
        );
        Ok(())
    }
}
