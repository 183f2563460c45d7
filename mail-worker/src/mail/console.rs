use async_trait::async_trait;

use super::EmailTransport;
use crate::error::TransportError;

/// Console transport for local development.
/// Logs the email instead of sending it.
#[derive(Debug)]
pub struct ConsoleTransport;

#[async_trait]
impl EmailTransport for ConsoleTransport {
    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<(), TransportError> {
        tracing::info!(
            to = %to,
            subject = %subject,
            html_length = html.len(),
            body = %html,
            "email_delivered_console"
        );
        Ok(())
    }
}
