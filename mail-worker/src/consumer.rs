//! RabbitMQ consumer module using lapin.
//!
//! The consumer is a long-running loop with two states:
//!
//! ```text
//! Disconnected ──connect ok──→ Consuming ──stream closed──→ Disconnected
//!      └──connect failed: sleep fixed interval, retry forever
//! ```
//!
//! Each delivery is handled by its own task; every handler ends in exactly
//! one ack, nack or dead-letter publish followed by an ack. Handlers still
//! running when the loop leaves `Consuming` get `SHUTDOWN_GRACE_MS` to settle
//! before the connection is closed.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        ConfirmSelectOptions,
    },
    types::{AMQPValue, FieldTable},
    Channel, Consumer,
};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PublishError, QueueError};
use crate::processor::{process_message, Disposition, ProcessorContext};
use crate::queue::client::{connect, BrokerConnection};
use crate::queue::publisher::{persistent_properties, send_confirmed};
use crate::queue::{EMAIL_DEAD_QUEUE, EMAIL_QUEUE};
use crate::shutdown::shutdown_signal;

const CONSUMER_TAG: &str = "solmail-worker";

/// Run the consumer until SIGINT/SIGTERM.
///
/// This function:
/// 1. Connects to RabbitMQ, retrying at a fixed interval until it succeeds
/// 2. Declares the topology and sets QoS to the configured concurrency
/// 3. Consumes messages, spawning a task for each
/// 4. Goes back to step 1 if the broker drops the connection
pub async fn run(config: Config, ctx: ProcessorContext) -> Result<()> {
    let config = Arc::new(config);
    let ctx = Arc::new(ctx);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let connected = connect_with_retry(
            || open_consumer(&config),
            config.broker_retry_interval,
            &mut shutdown,
        )
        .await;

        let Some((broker, consumer)) = connected else {
            info!("worker_stopping");
            break;
        };

        info!(queue = EMAIL_QUEUE, "worker_ready");

        let mut handlers = JoinSet::new();
        let end = consume(&broker.channel, consumer, &ctx, &mut handlers, &mut shutdown).await;
        drain_handlers(&mut handlers, config.shutdown_grace).await;
        broker.close().await;

        match end {
            ConsumeEnd::Shutdown => {
                info!("worker_stopping");
                break;
            }
            ConsumeEnd::StreamClosed => {
                warn!("rabbitmq_consumer_closed_reconnecting");
            }
        }
    }

    info!("worker_shutdown_complete");
    Ok(())
}

/// Call `connect` until it succeeds, sleeping `interval` between attempts.
///
/// There is no attempt cap. Returns `None` only when `shutdown` completes
/// first.
pub async fn connect_with_retry<T, E, F, Fut, S>(
    mut connect: F,
    interval: Duration,
    shutdown: &mut S,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    S: Future<Output = ()> + Unpin,
{
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = &mut *shutdown => return None,
            result = connect() => result,
        };

        match result {
            Ok(connected) => {
                info!(attempt = attempt, "rabbitmq_consumer_connected");
                return Some(connected);
            }
            Err(e) => {
                error!(
                    attempt = attempt,
                    error = %e,
                    retry_in_ms = interval.as_millis() as u64,
                    "rabbitmq_connect_failed"
                );
            }
        }

        tokio::select! {
            _ = &mut *shutdown => return None,
            _ = sleep(interval) => {}
        }
    }
}

/// Connect, enable confirms for dead-letter publishes, set QoS and subscribe.
async fn open_consumer(config: &Config) -> Result<(BrokerConnection, Consumer), QueueError> {
    let broker = connect(&config.broker_url, config.retry_delay).await?;

    let prefetch_count = u16::try_from(config.worker_concurrency.max(1)).unwrap_or(u16::MAX);
    broker
        .channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .map_err(QueueError::Configure)?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    broker
        .channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(QueueError::Configure)?;

    let consumer = broker
        .channel
        .basic_consume(
            EMAIL_QUEUE,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(QueueError::Configure)?;

    info!(queue = EMAIL_QUEUE, "rabbitmq_consumer_started");

    Ok((broker, consumer))
}

enum ConsumeEnd {
    Shutdown,
    StreamClosed,
}

async fn consume<S>(
    channel: &Channel,
    mut consumer: Consumer,
    ctx: &Arc<ProcessorContext>,
    handlers: &mut JoinSet<()>,
    shutdown: &mut S,
) -> ConsumeEnd
where
    S: Future<Output = ()> + Unpin,
{
    loop {
        tokio::select! {
            _ = &mut *shutdown => return ConsumeEnd::Shutdown,
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                log_handler_exit(finished);
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let attempt = attempt_from_headers(delivery.properties.headers().as_ref());

                        info!(
                            queue = EMAIL_QUEUE,
                            delivery_tag = delivery.delivery_tag,
                            redelivered = delivery.redelivered,
                            attempt = attempt,
                            "rabbitmq_job_received"
                        );

                        let channel = channel.clone();
                        let ctx = Arc::clone(ctx);

                        handlers.spawn(async move {
                            let disposition = process_message(&delivery.data, attempt, &ctx).await;
                            settle(&channel, delivery.delivery_tag, &delivery.data, attempt, disposition)
                                .await;
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => return ConsumeEnd::StreamClosed,
                }
            }
        }
    }
}

/// Wait up to `grace` for in-flight handlers, then abort the rest.
///
/// Returns how many handlers were aborted. Their deliveries stay unacked and
/// the broker redelivers them once the connection closes.
pub async fn drain_handlers(handlers: &mut JoinSet<()>, grace: Duration) -> usize {
    if handlers.is_empty() {
        return 0;
    }

    info!(
        in_flight = handlers.len(),
        grace_ms = grace.as_millis() as u64,
        "worker_draining_handlers"
    );

    let drained = timeout(grace, async {
        while let Some(finished) = handlers.join_next().await {
            log_handler_exit(finished);
        }
    })
    .await;

    if drained.is_ok() {
        info!("worker_handlers_drained");
        return 0;
    }

    let aborted = handlers.len();
    warn!(aborted = aborted, "worker_handlers_aborted");
    handlers.abort_all();
    while handlers.join_next().await.is_some() {}
    aborted
}

fn log_handler_exit(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            error!(error = %e, "email_handler_panicked");
        }
    }
}

/// Broker calls a settled delivery can make.
#[async_trait]
pub(crate) trait DeliveryChannel: Send + Sync {
    async fn ack(&self, delivery_tag: u64);

    /// Nack without requeue: the work queue dead-letters it into the retry
    /// queue, which hands it back after the retry delay.
    async fn nack(&self, delivery_tag: u64);

    /// Copy `body` to the dead-letter queue and wait for the broker confirm.
    async fn dead_letter(&self, body: &[u8], attempt: u32, reason: &str) -> Result<(), PublishError>;
}

#[async_trait]
impl DeliveryChannel for Channel {
    async fn ack(&self, delivery_tag: u64) {
        if let Err(e) = self
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
        {
            error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_ack_failed");
        }
    }

    async fn nack(&self, delivery_tag: u64) {
        if let Err(e) = self
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                },
            )
            .await
        {
            error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_nack_failed");
        }
    }

    async fn dead_letter(&self, body: &[u8], attempt: u32, reason: &str) -> Result<(), PublishError> {
        publish_dead_letter(self, body, attempt, reason).await
    }
}

/// Turn a disposition into the matching broker call.
pub(crate) async fn settle<C>(
    channel: &C,
    delivery_tag: u64,
    body: &[u8],
    attempt: u32,
    disposition: Disposition,
) where
    C: DeliveryChannel + ?Sized,
{
    match disposition {
        Disposition::Delivered | Disposition::Dropped { .. } => {
            channel.ack(delivery_tag).await;
        }
        Disposition::Retry { reason } => {
            warn!(delivery_tag = delivery_tag, attempt = attempt, reason = %reason, "email_job_nacked");
            channel.nack(delivery_tag).await;
        }
        Disposition::DeadLetter { reason } => match channel.dead_letter(body, attempt, &reason).await {
            Ok(()) => {
                error!(
                    delivery_tag = delivery_tag,
                    attempt = attempt,
                    reason = %reason,
                    dead_queue = EMAIL_DEAD_QUEUE,
                    "email_job_dead_lettered"
                );
                channel.ack(delivery_tag).await;
            }
            Err(e) => {
                error!(delivery_tag = delivery_tag, error = %e, "email_dead_letter_publish_failed");
                channel.nack(delivery_tag).await;
            }
        },
    }
}

async fn publish_dead_letter(
    channel: &Channel,
    body: &[u8],
    attempt: u32,
    reason: &str,
) -> Result<(), PublishError> {
    let mut headers = FieldTable::default();
    headers.insert("x-last-error".into(), AMQPValue::LongString(reason.into()));
    headers.insert("x-attempts".into(), AMQPValue::LongUInt(attempt));

    let properties = persistent_properties("dead-letter").with_headers(headers);
    send_confirmed(channel, EMAIL_DEAD_QUEUE, body, properties).await
}

/// Delivery attempt (1-based) derived from the broker's `x-death` header.
///
/// Each rejection from the work queue adds to the `count` of the `x-death`
/// entry whose `queue` is the work queue.
pub fn attempt_from_headers(headers: Option<&FieldTable>) -> u32 {
    let rejections = headers
        .and_then(|h| field(h, "x-death"))
        .and_then(|deaths| match deaths {
            AMQPValue::FieldArray(entries) => Some(entries.as_slice()),
            _ => None,
        })
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    AMQPValue::FieldTable(table) => Some(table),
                    _ => None,
                })
                .filter(|table| field(table, "queue").and_then(as_string).as_deref() == Some(EMAIL_QUEUE))
                .filter_map(|table| field(table, "count").and_then(as_count))
                .sum::<u64>()
        })
        .unwrap_or(0);

    u32::try_from(rejections.saturating_add(1)).unwrap_or(u32::MAX)
}

fn field<'a>(table: &'a FieldTable, key: &str) -> Option<&'a AMQPValue> {
    table
        .inner()
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v)
}

fn as_string(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

fn as_count(value: &AMQPValue) -> Option<u64> {
    match value {
        AMQPValue::LongLongInt(n) => u64::try_from(*n).ok(),
        AMQPValue::LongInt(n) => u64::try_from(*n).ok(),
        AMQPValue::LongUInt(n) => Some(u64::from(*n)),
        AMQPValue::ShortInt(n) => u64::try_from(*n).ok(),
        AMQPValue::ShortUInt(n) => Some(u64::from(*n)),
        _ => None,
    }
}
