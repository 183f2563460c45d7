//! Scheduled batch producers.
//!
//! A job's guards are evaluated when it fires, never at registration, so a
//! process started outside a job's window still registers it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::db::{LatchStore, Recipient, RecipientList, RecipientSource};
use crate::error::EmailJobError;
use crate::queue::{EmailJob, EmailQueue};
use crate::template::FRONTEND_URL_KEY;

/// Latch key guarding the one-time launch announcement.
pub const LAUNCH_LATCH: &str = "launch-email";

pub const LAUNCH_TEMPLATE: &str = "launch-email.hbs";

pub const NEWSLETTER_TEMPLATE: &str = "newsletter-mail.hbs";

/// A time-triggered batch producer.
#[async_trait]
pub trait DispatchJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cron expression with a leading seconds field.
    fn schedule(&self) -> &str;

    /// Run the job as of `now` (in the scheduling timezone).
    async fn fire(&self, now: DateTime<Tz>) -> DispatchReport;
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Recipients were enumerated and each one attempted.
    Completed,
    /// A guard declined the run.
    Skipped(String),
    /// A systemic failure ended the run; the next trigger retries.
    Aborted(String),
}

/// Summary of one run, logged by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub job: &'static str,
    pub outcome: RunOutcome,
    pub attempted: usize,
    pub enqueued: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn new(job: &'static str, outcome: RunOutcome) -> Self {
        Self {
            job,
            outcome,
            attempted: 0,
            enqueued: 0,
            failed: 0,
        }
    }

    pub fn log(&self) {
        match &self.outcome {
            RunOutcome::Completed => info!(
                job = self.job,
                attempted = self.attempted,
                enqueued = self.enqueued,
                failed = self.failed,
                "dispatch_run_completed"
            ),
            RunOutcome::Skipped(reason) => info!(job = self.job, reason = %reason, "dispatch_run_skipped"),
            RunOutcome::Aborted(reason) => error!(job = self.job, reason = %reason, "dispatch_run_aborted"),
        }
    }
}

/// Enqueue one job per recipient. A failing recipient is logged and counted;
/// the batch carries on with the rest.
pub async fn run_batch<F>(
    job: &'static str,
    queue: &dyn EmailQueue,
    recipients: &[Recipient],
    build: F,
) -> DispatchReport
where
    F: Fn(&Recipient) -> Result<EmailJob, EmailJobError>,
{
    let mut report = DispatchReport::new(job, RunOutcome::Completed);

    for recipient in recipients {
        report.attempted += 1;

        let result = match build(recipient) {
            Ok(email) => queue.publish(&email).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => report.enqueued += 1,
            Err(e) => {
                report.failed += 1;
                warn!(job = job, recipient = %recipient.email, error = %e, "dispatch_enqueue_failed");
            }
        }
    }

    report
}

/// Where and how scheduled jobs address their emails.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub site: Option<String>,
    pub frontend_url: String,
    pub brand: String,
}

impl SiteContext {
    fn email(
        &self,
        to: &str,
        subject: String,
        template: &str,
        data: Map<String, Value>,
    ) -> Result<EmailJob, EmailJobError> {
        let job = EmailJob::new(to, subject, template, data)?;
        Ok(match &self.site {
            Some(site) => job.with_site(site.clone()),
            None => job,
        })
    }
}

/// One-time launch announcement.
///
/// Fires only within `year`, and only until the durable latch is set.
pub struct LaunchJob {
    pub schedule: String,
    pub year: i32,
    pub site: SiteContext,
    pub queue: Arc<dyn EmailQueue>,
    pub recipients: Arc<dyn RecipientSource>,
    pub latch: Arc<dyn LatchStore>,
}

#[async_trait]
impl DispatchJob for LaunchJob {
    fn name(&self) -> &'static str {
        "launch_email"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn fire(&self, now: DateTime<Tz>) -> DispatchReport {
        if now.year() != self.year {
            return DispatchReport::new(
                self.name(),
                RunOutcome::Skipped(format!("not {}", self.year)),
            );
        }

        match self.latch.is_set(LAUNCH_LATCH).await {
            Ok(true) => {
                return DispatchReport::new(self.name(), RunOutcome::Skipped("already sent".to_string()))
            }
            Ok(false) => {}
            Err(e) => return DispatchReport::new(self.name(), RunOutcome::Aborted(e.to_string())),
        }

        let recipients = match self.recipients.list_recipients(RecipientList::LaunchMails).await {
            Ok(recipients) => recipients,
            Err(e) => return DispatchReport::new(self.name(), RunOutcome::Aborted(e.to_string())),
        };

        info!(job = self.name(), recipients = recipients.len(), "dispatch_run_started");

        let subject = format!("{} Is Officially Live!", self.site.brand);
        let mut data = Map::new();
        data.insert(
            FRONTEND_URL_KEY.to_string(),
            Value::String(self.site.frontend_url.clone()),
        );

        let mut report = run_batch(self.name(), self.queue.as_ref(), &recipients, |r| {
            self.site.email(&r.email, subject.clone(), LAUNCH_TEMPLATE, data.clone())
        })
        .await;

        // Nothing went out: leave the latch unset so the next trigger retries.
        if report.enqueued == 0 && report.failed > 0 {
            report.outcome = RunOutcome::Aborted(format!("all {} publishes failed", report.failed));
            return report;
        }

        if let Err(e) = self.latch.set(LAUNCH_LATCH).await {
            error!(job = self.name(), error = %e, "dispatch_latch_set_failed");
        }

        report
    }
}

/// Monthly newsletter, gated on a not-before instant.
pub struct NewsletterJob {
    pub schedule: String,
    pub not_before: DateTime<Utc>,
    pub list: RecipientList,
    pub site: SiteContext,
    pub queue: Arc<dyn EmailQueue>,
    pub recipients: Arc<dyn RecipientSource>,
}

impl NewsletterJob {
    fn template_data(&self, month: &str) -> Map<String, Value> {
        let data = json!({
            "heading": format!("You've unlocked the {} Transmission", month),
            "intro": "This month we drop heat, share behind-the-scenes moments, and celebrate YOU, the real warrior.",
            "content": "Introducing our latest drop: *Solar Surge*. Bold designs, ethically made, unapologetically strong. You'll want to grab these before they vanish.",
            "cta": {
                "text": "Shop the Drop",
                "link": format!("{}/products", self.site.frontend_url.trim_end_matches('/')),
            },
        });

        match data {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl DispatchJob for NewsletterJob {
    fn name(&self) -> &'static str {
        "monthly_newsletter"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn fire(&self, now: DateTime<Tz>) -> DispatchReport {
        if now.with_timezone(&Utc) < self.not_before {
            return DispatchReport::new(
                self.name(),
                RunOutcome::Skipped(format!("before {}", self.not_before.to_rfc3339())),
            );
        }

        let recipients = match self.recipients.list_recipients(self.list).await {
            Ok(recipients) => recipients,
            Err(e) => return DispatchReport::new(self.name(), RunOutcome::Aborted(e.to_string())),
        };

        if recipients.is_empty() {
            return DispatchReport::new(self.name(), RunOutcome::Skipped("no subscribers".to_string()));
        }

        info!(job = self.name(), recipients = recipients.len(), "dispatch_run_started");

        let month = now.format("%B").to_string();
        let subject = format!("🔥 {} Newsletter – {} Is Here!", month, self.site.brand);
        let data = self.template_data(&month);

        run_batch(self.name(), self.queue.as_ref(), &recipients, |r| {
            self.site.email(&r.email, subject.clone(), NEWSLETTER_TEMPLATE, data.clone())
        })
        .await
    }
}
