use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use super::EmailTransport;
use crate::error::TransportError;

/// SMTP transport for production use.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Create a new SMTP transport.
    ///
    /// With credentials the connection is upgraded via STARTTLS; without them
    /// it talks plain SMTP (local relays, test sinks). Half a credential pair
    /// is a configuration error.
    pub fn new(
        host: &str,
        port: u16,
        user: Option<String>,
        pass: Option<String>,
        from: &str,
    ) -> Result<Self, TransportError> {
        let from: Mailbox = from.parse().map_err(|e| TransportError::Address {
            address: from.to_string(),
            message: format!("{}", e),
        })?;

        let transport = match (user, pass) {
            (Some(user), Some(pass)) => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| TransportError::Config(format!("Invalid SMTP relay '{}': {}", host, e)))?
                .port(port)
                .credentials(Credentials::new(user, pass))
                .build(),
            (None, None) => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .port(port)
                .build(),
            _ => {
                return Err(TransportError::Config(
                    "SMTP_USER and SMTP_PASS must be set together".to_string(),
                ))
            }
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<(), TransportError> {
        let to: Mailbox = to.parse().map_err(|e| TransportError::Address {
            address: to.to_string(),
            message: format!("{}", e),
        })?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Smtp(e.to_string()))
    }
}
