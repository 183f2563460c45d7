//! Queue message types and the queue names shared by producer and consumer.
//!
//! The queue names below are the wire contract: every producer and the
//! consumer declare the same topology from these constants, so renaming one
//! is a breaking change to in-flight messages.
//!
//! The work queue carries dead-letter arguments, and the broker refuses to
//! redeclare an existing queue with different arguments. Any change to the
//! declared arguments therefore bumps the version suffix.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EmailJobError;

/// Work queue holding pending email jobs.
pub const EMAIL_QUEUE: &str = "email_queue.v2";

/// Holding queue for nacked jobs; expires them back into [`EMAIL_QUEUE`].
pub const EMAIL_RETRY_QUEUE: &str = "email_queue.v2.retry";

/// Parking queue for jobs that exhausted their delivery attempts.
pub const EMAIL_DEAD_QUEUE: &str = "email_queue.v2.dead";

/// Argument-less queue used by producers that predate the retry topology.
pub const LEGACY_EMAIL_QUEUE: &str = "email_queue";

/// One email to render and deliver.
///
/// Field names on the wire follow the JSON format existing producers emit:
/// `email`, `subject`, `templatePath`, `templateData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient address
    #[serde(rename = "email")]
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Template identifier, relative to the template root
    #[serde(rename = "templatePath")]
    pub template_id: String,
    /// Values handed to the template
    #[serde(rename = "templateData", default)]
    pub template_data: Map<String, Value>,
    /// Brand/site key selecting frontend URL and template subdirectory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl EmailJob {
    /// Build a validated job.
    ///
    /// The recipient is trimmed and must parse as an email address; subject
    /// and template id must be non-empty.
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        template_id: impl Into<String>,
        template_data: Map<String, Value>,
    ) -> Result<Self, EmailJobError> {
        let job = Self {
            recipient: recipient.into().trim().to_string(),
            subject: subject.into(),
            template_id: template_id.into(),
            template_data,
            site: None,
        };
        job.validate()?;
        Ok(job)
    }

    /// Attach a site key.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Check the invariants `new` enforces. Jobs deserialized from the wire
    /// are checked again by the producer before publishing.
    pub fn validate(&self) -> Result<(), EmailJobError> {
        if self.recipient.is_empty() {
            return Err(EmailJobError::EmptyRecipient);
        }
        if self.recipient.parse::<lettre::Address>().is_err() {
            return Err(EmailJobError::InvalidRecipient(self.recipient.clone()));
        }
        if self.subject.trim().is_empty() {
            return Err(EmailJobError::EmptySubject);
        }
        if self.template_id.trim().is_empty() {
            return Err(EmailJobError::EmptyTemplate);
        }
        Ok(())
    }

    /// Message id attached to the broker message, for log correlation.
    pub fn message_id(&self) -> String {
        format!("{}:{}", self.template_id, self.recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_field_names() {
        let mut data = Map::new();
        data.insert("name".to_string(), json!("A"));
        let job = EmailJob::new("a@x.com", "Hi", "welcome.ejs", data).unwrap();

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({
                "email": "a@x.com",
                "subject": "Hi",
                "templatePath": "welcome.ejs",
                "templateData": { "name": "A" }
            })
        );
    }

    #[test]
    fn test_missing_template_data_defaults_to_empty() {
        let raw = r#"{"email":"a@x.com","subject":"Welcome","templatePath":"newsletter-confirmation.hbs"}"#;
        let job: EmailJob = serde_json::from_str(raw).unwrap();
        assert!(job.template_data.is_empty());
        assert_eq!(job.site, None);
    }

    #[test]
    fn test_site_round_trips_when_present() {
        let job = EmailJob::new("a@x.com", "Hi", "t.hbs", Map::new())
            .unwrap()
            .with_site("tasha");
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"site\":\"tasha\""));
    }

    #[test]
    fn test_queue_names_do_not_collide_with_legacy_queue() {
        let names = [EMAIL_QUEUE, EMAIL_RETRY_QUEUE, EMAIL_DEAD_QUEUE];
        assert!(!names.contains(&LEGACY_EMAIL_QUEUE));
        assert!(EMAIL_RETRY_QUEUE.starts_with(EMAIL_QUEUE));
        assert!(EMAIL_DEAD_QUEUE.starts_with(EMAIL_QUEUE));
    }

    #[test]
    fn test_recipient_is_trimmed() {
        let job = EmailJob::new("  a@x.com ", "Hi", "t.hbs", Map::new()).unwrap();
        assert_eq!(job.recipient, "a@x.com");
    }

    #[test]
    fn test_rejects_invalid_jobs() {
        assert_eq!(
            EmailJob::new("", "Hi", "t.hbs", Map::new()).unwrap_err(),
            EmailJobError::EmptyRecipient
        );
        assert!(matches!(
            EmailJob::new("not-an-address", "Hi", "t.hbs", Map::new()).unwrap_err(),
            EmailJobError::InvalidRecipient(_)
        ));
        assert_eq!(
            EmailJob::new("a@x.com", "  ", "t.hbs", Map::new()).unwrap_err(),
            EmailJobError::EmptySubject
        );
        assert_eq!(
            EmailJob::new("a@x.com", "Hi", "", Map::new()).unwrap_err(),
            EmailJobError::EmptyTemplate
        );
    }
}
