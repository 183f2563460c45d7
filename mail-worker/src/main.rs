//! Solmail Worker - RabbitMQ consumer that renders and delivers queued emails.
//!
//! The worker drains `email_queue.v2`, renders each job's template and hands the
//! HTML to the configured mail transport. Failed deliveries go through the
//! retry queue until `EMAIL_MAX_ATTEMPTS`, then to `email_queue.v2.dead`.

use std::sync::Arc;

use anyhow::{Context, Result};

use solmail::queue::redact_url;
use solmail::{consumer, mail, telemetry, Config, ProcessorContext, TemplateRenderer};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    tracing::info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        broker_url = %redact_url(&config.broker_url),
        template_root = %config.template_root,
        mail_adapter = %config.mail_adapter,
        concurrency = config.worker_concurrency,
        max_attempts = config.max_attempts,
        retry_delay_ms = config.retry_delay.as_millis() as u64,
        "config_loaded"
    );

    let transport = mail::from_config(&config).context("Failed to configure mail transport")?;

    let ctx = ProcessorContext {
        renderer: Arc::new(TemplateRenderer::from_config(&config)),
        transport,
        max_attempts: config.max_attempts,
    };

    consumer::run(config, ctx).await?;

    Ok(())
}
