//! Durable queue topology declaration.
//!
//! Declares the job queue, status queue, and dead-letter routing. The
//! declaration is idempotent when every process uses the constants in
//! [`plugrid_core::queues`]; a mismatch makes RabbitMQ close the
//! channel with PRECONDITION_FAILED, which surfaces here as
//! [`BrokerError::Topology`] and must abort startup.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};

use plugrid_core::queues;

use crate::connection::BrokerError;

/// Declare the full topology on the given channel.
///
/// Order matters: the dead-letter exchange and queue must exist before
/// `job_queue` references the exchange in its arguments.
pub async fn declare(channel: &Channel) -> Result<(), BrokerError> {
    fn durable() -> QueueDeclareOptions {
        QueueDeclareOptions {
            durable: true,
            ..Default::default()
        }
    }

    channel
        .exchange_declare(
            queues::DLX_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            name: queues::DLX_EXCHANGE,
            source,
        })?;

    channel
        .queue_declare(queues::DEAD_LETTER_QUEUE, durable(), FieldTable::default())
        .await
        .map_err(|source| BrokerError::Topology {
            name: queues::DEAD_LETTER_QUEUE,
            source,
        })?;

    // Dead-lettered job messages keep their original routing key, which
    // is the job queue's name (they were published via the default
    // exchange).
    channel
        .queue_bind(
            queues::DEAD_LETTER_QUEUE,
            queues::DLX_EXCHANGE,
            queues::JOB_QUEUE,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            name: queues::DEAD_LETTER_QUEUE,
            source,
        })?;

    let mut job_args = FieldTable::default();
    job_args.insert(
        "x-message-ttl".into(),
        AMQPValue::LongLongInt(queues::JOB_QUEUE_TTL_MS),
    );
    job_args.insert(
        "x-max-length".into(),
        AMQPValue::LongLongInt(queues::JOB_QUEUE_MAX_LENGTH),
    );
    job_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(queues::DLX_EXCHANGE.into()),
    );

    channel
        .queue_declare(queues::JOB_QUEUE, durable(), job_args)
        .await
        .map_err(|source| BrokerError::Topology {
            name: queues::JOB_QUEUE,
            source,
        })?;

    // No dead-letter routing: expired status messages are dropped.
    let mut status_args = FieldTable::default();
    status_args.insert(
        "x-message-ttl".into(),
        AMQPValue::LongLongInt(queues::STATUS_QUEUE_TTL_MS),
    );

    channel
        .queue_declare(queues::STATUS_QUEUE, durable(), status_args)
        .await
        .map_err(|source| BrokerError::Topology {
            name: queues::STATUS_QUEUE,
            source,
        })?;

    tracing::info!("Queue topology declared");
    Ok(())
}
