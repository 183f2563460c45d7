//! Message processing - decides the fate of one delivery.
//!
//! [`process_message`] parses, renders and delivers a single queue message
//! and returns a [`Disposition`]; the consumer turns that into an ack, a nack
//! or a dead-letter publish. Nothing here touches the broker, so every path is
//! testable without one.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::mail::EmailTransport;
use crate::queue::EmailJob;
use crate::template::TemplateRenderer;

/// Shared collaborators for message handlers.
pub struct ProcessorContext {
    pub renderer: Arc<TemplateRenderer>,
    pub transport: Arc<dyn EmailTransport>,
    /// Deliveries before a failing message is dead-lettered; 0 disables the cap
    pub max_attempts: u32,
}

/// Outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Transport accepted the email: ack.
    Delivered,
    /// Unparsable or invalid body: ack and drop, never requeue.
    Dropped { reason: String },
    /// Render or delivery failed: nack so the broker redelivers.
    Retry { reason: String },
    /// Failed on its last allowed attempt: park in the dead-letter queue.
    DeadLetter { reason: String },
}

/// Process one message body on its `attempt`-th delivery (1-based).
pub async fn process_message(body: &[u8], attempt: u32, ctx: &ProcessorContext) -> Disposition {
    if body.iter().all(u8::is_ascii_whitespace) {
        warn!(attempt = attempt, "email_message_empty");
        return Disposition::Dropped {
            reason: "empty body".to_string(),
        };
    }

    let mut job: EmailJob = match serde_json::from_slice(body) {
        Ok(job) => job,
        Err(e) => {
            error!(
                error = %e,
                body_preview = %String::from_utf8_lossy(&body[..body.len().min(500)]),
                "email_message_parse_failed"
            );
            return Disposition::Dropped {
                reason: format!("unparsable body: {}", e),
            };
        }
    };

    // Older producers do not trim addresses before publishing.
    job.recipient = job.recipient.trim().to_string();

    if let Err(e) = job.validate() {
        error!(recipient = %job.recipient, error = %e, "email_message_invalid");
        return Disposition::Dropped {
            reason: format!("invalid job: {}", e),
        };
    }

    info!(
        recipient = %job.recipient,
        template = %job.template_id,
        site = ?job.site,
        attempt = attempt,
        "email_job_received"
    );

    let html = match ctx
        .renderer
        .render(&job.template_id, &job.template_data, job.site.as_deref())
    {
        Ok(html) => html,
        Err(e) => {
            error!(
                recipient = %job.recipient,
                template = %job.template_id,
                attempt = attempt,
                error = %e,
                "email_render_failed"
            );
            return failure(format!("render failed: {}", e), attempt, ctx.max_attempts);
        }
    };

    match ctx.transport.deliver(&job.recipient, &job.subject, &html).await {
        Ok(()) => {
            info!(
                recipient = %job.recipient,
                template = %job.template_id,
                attempt = attempt,
                "email_delivered"
            );
            Disposition::Delivered
        }
        Err(e) => {
            error!(
                recipient = %job.recipient,
                template = %job.template_id,
                attempt = attempt,
                error = %e,
                "email_delivery_failed"
            );
            failure(format!("delivery failed: {}", e), attempt, ctx.max_attempts)
        }
    }
}

fn failure(reason: String, attempt: u32, max_attempts: u32) -> Disposition {
    if max_attempts > 0 && attempt >= max_attempts {
        Disposition::DeadLetter { reason }
    } else {
        Disposition::Retry { reason }
    }
}
