//! Solmail Scheduler - cron-triggered batch dispatch.
//!
//! Registers the launch announcement and the monthly newsletter, then waits
//! for SIGINT/SIGTERM. Jobs only enqueue; the worker delivers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use solmail::db::{PgStore, RecipientList};
use solmail::queue::redact_url;
use solmail::schedule::{DispatchScheduler, LaunchJob, NewsletterJob, SiteContext};
use solmail::shutdown::shutdown_signal;
use solmail::{telemetry, Config, Publisher};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    info!("scheduler_starting");

    let config = Config::from_env();
    info!(
        broker_url = %redact_url(&config.broker_url),
        timezone = %config.schedule_timezone,
        launch_schedule = %config.launch_schedule,
        launch_year = config.launch_year,
        newsletter_schedule = %config.newsletter_schedule,
        newsletter_not_before = %config.newsletter_not_before,
        site = ?config.schedule_site,
        "config_loaded"
    );

    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("Failed to connect to database")?,
    );
    let queue = Arc::new(Publisher::new(config.broker_url.clone(), config.retry_delay));

    let site = SiteContext {
        site: config.schedule_site.clone(),
        frontend_url: config
            .frontend_url_for(config.schedule_site.as_deref())
            .to_string(),
        brand: config.brand_name.clone(),
    };

    let launch = LaunchJob {
        schedule: config.launch_schedule.clone(),
        year: config.launch_year,
        site: site.clone(),
        queue: queue.clone(),
        recipients: store.clone(),
        latch: store.clone(),
    };

    // Newsletter goes to the launch signups.
    let newsletter = NewsletterJob {
        schedule: config.newsletter_schedule.clone(),
        not_before: config.newsletter_not_before,
        list: RecipientList::LaunchMails,
        site,
        queue,
        recipients: store,
    };

    let mut scheduler = DispatchScheduler::new(config.schedule_timezone)
        .await
        .context("Failed to create scheduler")?;
    scheduler
        .register(Arc::new(launch))
        .await
        .context("Failed to register launch job")?;
    scheduler
        .register(Arc::new(newsletter))
        .await
        .context("Failed to register newsletter job")?;
    scheduler.start().await.context("Failed to start scheduler")?;

    shutdown_signal().await;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;

    info!("scheduler_shutdown_complete");

    Ok(())
}
