//! Error taxonomy for the email dispatch pipeline.
//!
//! Each stage surfaces its own error type so callers can decide the fate of
//! their own operation: the consumer maps render and transport failures to a
//! nack, the producer hands publish failures back to the business handler.

use thiserror::Error;

/// Broker connection failures (connect, channel, topology declaration).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to broker: {0}")]
    Connection(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare queue '{queue}': {source}")]
    Declare {
        queue: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to configure channel: {0}")]
    Configure(#[source] lapin::Error),
}

/// A message could not be handed to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid email job: {0}")]
    InvalidJob(#[from] EmailJobError),

    #[error(transparent)]
    Connection(#[from] QueueError),

    #[error("failed to serialize email job: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish message: {0}")]
    Send(#[source] lapin::Error),

    #[error("broker rejected the message")]
    Nacked,
}

/// Construction-time invariants of an email job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailJobError {
    #[error("recipient is empty")]
    EmptyRecipient,

    #[error("recipient '{0}' is not a valid address")]
    InvalidRecipient(String),

    #[error("subject is empty")]
    EmptySubject,

    #[error("template id is empty")]
    EmptyTemplate,
}

/// Template resolution and rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("failed to read template '{template}': {source}")]
    Read {
        template: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template '{template}': {message}")]
    Render { template: String, message: String },
}

/// Mail delivery failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mail transport misconfigured: {0}")]
    Config(String),

    #[error("invalid address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Smtp(String),
}

/// Database failures from recipient lists, subscribers and latches.
#[derive(Debug, Error)]
#[error("database error: {0}")]
pub struct StoreError(#[from] pub sqlx::Error);

/// Scheduler setup failures.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron schedule '{schedule}' for job {job}")]
    InvalidCron { job: &'static str, schedule: String },

    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
