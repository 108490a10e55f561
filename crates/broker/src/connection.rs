//! AMQP connection establishment and the broker error type.

use lapin::{Connection, ConnectionProperties};

/// Open a connection to the broker.
///
/// Each component that talks to the broker owns its own connection: the
/// job consumer holds one, and every executor's status publisher holds
/// its own, so none of them contend on a shared channel.
pub async fn connect(amqp_url: &str) -> Result<Connection, BrokerError> {
    let connection = Connection::connect(amqp_url, ConnectionProperties::default())
        .await
        .map_err(BrokerError::Connect)?;

    tracing::info!(url = %amqp_url, "Connected to broker");
    Ok(connection)
}

/// Errors from the broker layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The initial connection could not be established.
    #[error("Broker connection failed: {0}")]
    Connect(#[source] lapin::Error),

    /// A declare was rejected, most likely because the entity already
    /// exists with different arguments (PRECONDITION_FAILED). Fatal at
    /// startup -- the topology constants disagree between processes.
    #[error("Topology declaration failed for `{name}`: {source}")]
    Topology {
        name: &'static str,
        #[source]
        source: lapin::Error,
    },

    /// A channel-level operation (publish, consume, ack) failed.
    #[error("Broker channel error: {0}")]
    Channel(#[from] lapin::Error),

    /// The job consumer's delivery stream ended. The channel is dead;
    /// distinct from a clean shutdown so supervisors can restart the
    /// worker.
    #[error("Job consumer stream ended unexpectedly")]
    ConsumerEnded,

    /// A status message could not be serialized.
    #[error("Status message serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
