//! Time-triggered dispatch of batch emails.
//!
//! [`DispatchScheduler`] evaluates cron expressions (with a leading seconds
//! field) in a configured timezone and calls [`DispatchJob::fire`] on every
//! trigger. Jobs only enqueue; delivery stays with the consumer.

pub mod jobs;

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{info, warn};

use crate::error::ScheduleError;

pub use jobs::{
    run_batch, DispatchJob, DispatchReport, LaunchJob, NewsletterJob, RunOutcome, SiteContext,
    LAUNCH_LATCH, LAUNCH_TEMPLATE, NEWSLETTER_TEMPLATE,
};

/// Cron scheduler for [`DispatchJob`]s.
pub struct DispatchScheduler {
    inner: JobScheduler,
    timezone: Tz,
}

impl DispatchScheduler {
    pub async fn new(timezone: Tz) -> Result<Self, ScheduleError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, timezone })
    }

    /// Register `job` on its own schedule. Guards run at fire time.
    pub async fn register(&mut self, job: Arc<dyn DispatchJob>) -> Result<(), ScheduleError> {
        let name = job.name();
        let schedule = job.schedule().to_string();
        let timezone = self.timezone;

        let cron_job = CronJob::new_async_tz(schedule.as_str(), timezone, move |_uuid, _lock| {
            let job = job.clone();
            Box::pin(async move {
                let report = job.fire(Utc::now().with_timezone(&timezone)).await;
                report.log();
            })
        })
        .map_err(|e| {
            warn!(job = name, schedule = %schedule, error = %e, "dispatch_schedule_invalid");
            ScheduleError::InvalidCron {
                job: name,
                schedule: schedule.clone(),
            }
        })?;

        self.inner.add(cron_job).await?;

        info!(job = name, schedule = %schedule, timezone = %timezone, "dispatch_job_registered");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), ScheduleError> {
        self.inner.start().await?;
        info!(timezone = %self.timezone, "dispatch_scheduler_started");
        Ok(())
    }

    /// Stop triggering. A run already in flight is not interrupted.
    pub async fn shutdown(&mut self) -> Result<(), ScheduleError> {
        self.inner.shutdown().await?;
        info!("dispatch_scheduler_stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;

    struct Noop {
        schedule: &'static str,
    }

    #[async_trait]
    impl DispatchJob for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn schedule(&self) -> &str {
            self.schedule
        }

        async fn fire(&self, _now: DateTime<Tz>) -> DispatchReport {
            DispatchReport {
                job: "noop",
                outcome: RunOutcome::Skipped("noop".to_string()),
                attempted: 0,
                enqueued: 0,
                failed: 0,
            }
        }
    }

    #[tokio::test]
    async fn test_register_valid_schedule() {
        let mut scheduler = DispatchScheduler::new(chrono_tz::America::New_York)
            .await
            .unwrap();

        scheduler
            .register(Arc::new(Noop { schedule: "0 11 11 1 * *" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_schedule() {
        let mut scheduler = DispatchScheduler::new(chrono_tz::America::New_York)
            .await
            .unwrap();

        let err = scheduler
            .register(Arc::new(Noop { schedule: "every tuesday" }))
            .await
            .unwrap_err();

        assert!(matches!(err, ScheduleError::InvalidCron { job: "noop", .. }));
    }
}
