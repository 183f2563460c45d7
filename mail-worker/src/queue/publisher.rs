//! Producer side of the email queue.
//!
//! Business handlers call [`enqueue_email`] (or [`EmailQueue::publish`]) to
//! notify a user without waiting on template rendering or SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions},
    BasicProperties, Channel,
};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::client::connect;
use super::types::{EmailJob, EMAIL_QUEUE};
use crate::error::{PublishError, QueueError};

/// Destination for email jobs.
///
/// A single attempt per call; retrying is the caller's decision.
#[async_trait]
pub trait EmailQueue: Send + Sync {
    async fn publish(&self, job: &EmailJob) -> Result<(), PublishError>;
}

/// RabbitMQ publisher.
///
/// Every publish opens its own connection, declares the topology, sends one
/// persistent message, waits for the broker confirm and closes again.
#[derive(Clone)]
pub struct Publisher {
    url: String,
    retry_delay: Duration,
}

impl Publisher {
    /// Create a new publisher for the given broker URL.
    ///
    /// `retry_delay` must match the consumer's setting: it is part of the
    /// retry queue declaration.
    pub fn new(url: String, retry_delay: Duration) -> Self {
        Self { url, retry_delay }
    }
}

#[async_trait]
impl EmailQueue for Publisher {
    async fn publish(&self, job: &EmailJob) -> Result<(), PublishError> {
        job.validate()?;
        let body = serde_json::to_vec(job)?;

        let broker = connect(&self.url, self.retry_delay).await?;
        let result = send_persistent(&broker.channel, EMAIL_QUEUE, &job.message_id(), &body).await;
        broker.close().await;

        match &result {
            Ok(()) => info!(
                queue = EMAIL_QUEUE,
                recipient = %job.recipient,
                template = %job.template_id,
                body_length = body.len(),
                "email_job_published"
            ),
            Err(e) => error!(
                queue = EMAIL_QUEUE,
                recipient = %job.recipient,
                template = %job.template_id,
                error = %e,
                "email_job_publish_failed"
            ),
        }

        result
    }
}

/// Enable publisher confirms, then publish `body` to `queue` as a persistent
/// JSON message and wait for the broker to confirm it.
async fn send_persistent(
    channel: &Channel,
    queue: &str,
    message_id: &str,
    body: &[u8],
) -> Result<(), PublishError> {
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| PublishError::Connection(QueueError::Configure(e)))?;

    send_confirmed(channel, queue, body, persistent_properties(message_id)).await
}

pub(crate) fn persistent_properties(message_id: &str) -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(2) // Persistent
        .with_content_type("application/json".into())
        .with_message_id(message_id.into())
}

/// Publish on a channel already in confirm mode and wait for the confirm.
pub(crate) async fn send_confirmed(
    channel: &Channel,
    queue: &str,
    body: &[u8],
    properties: BasicProperties,
) -> Result<(), PublishError> {
    let confirmation = channel
        .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
        .await
        .map_err(PublishError::Send)?
        .await
        .map_err(PublishError::Send)?;

    if confirmation.is_nack() {
        return Err(PublishError::Nacked);
    }

    Ok(())
}

/// Build, validate and publish an email job.
///
/// This is the entry point business handlers use. Whether a failure here
/// aborts the handler's own operation is the handler's call.
pub async fn enqueue_email<Q>(
    queue: &Q,
    recipient: &str,
    subject: &str,
    template_id: &str,
    template_data: Map<String, Value>,
) -> Result<(), PublishError>
where
    Q: EmailQueue + ?Sized,
{
    let job = EmailJob::new(recipient, subject, template_id, template_data)?;
    queue.publish(&job).await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records published jobs; fails for recipients listed in `failing`.
    #[derive(Default)]
    pub struct RecordingQueue {
        pub published: Mutex<Vec<EmailJob>>,
        pub failing: Vec<String>,
    }

    impl RecordingQueue {
        pub fn failing_for(recipients: &[&str]) -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                failing: recipients.iter().map(|r| r.to_string()).collect(),
            }
        }

        pub fn jobs(&self) -> Vec<EmailJob> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailQueue for RecordingQueue {
        async fn publish(&self, job: &EmailJob) -> Result<(), PublishError> {
            if self.failing.contains(&job.recipient) {
                return Err(PublishError::Nacked);
            }
            self.published.lock().unwrap().push(job.clone());
            Ok(())
        }
    }
}
