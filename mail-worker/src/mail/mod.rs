//! Email transports.
//!
//! The consumer delivers rendered HTML through an [`EmailTransport`]; which
//! one is chosen by `MAIL_ADAPTER`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::TransportError;

pub use console::ConsoleTransport;
pub use smtp::SmtpTransport;

mod console;
mod smtp;

/// Abstract interface for delivering a rendered email. Swappable per environment.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<(), TransportError>;
}

/// Build the email transport from config.
pub fn from_config(config: &Config) -> Result<Arc<dyn EmailTransport>, TransportError> {
    match config.mail_adapter.as_str() {
        "console" => Ok(Arc::new(ConsoleTransport)),
        "smtp" => {
            let host = config.smtp_host.clone().ok_or_else(|| {
                TransportError::Config("SMTP_HOST is required for SMTP adapter".to_string())
            })?;

            Ok(Arc::new(SmtpTransport::new(
                &host,
                config.smtp_port,
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
                &config.mail_from,
            )?))
        }
        other => Err(TransportError::Config(format!("Unknown MAIL_ADAPTER: {}", other))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_rejects_unknown_adapter() {
        let mut config = Config::from_env();
        config.mail_adapter = "carrier-pigeon".to_string();
        assert!(matches!(from_config(&config), Err(TransportError::Config(_))));
    }

    #[test]
    fn test_from_config_smtp_requires_host() {
        let mut config = Config::from_env();
        config.mail_adapter = "smtp".to_string();
        config.smtp_host = None;
        assert!(matches!(from_config(&config), Err(TransportError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_config_console() {
        let mut config = Config::from_env();
        config.mail_adapter = "console".to_string();
        let transport = from_config(&config).unwrap();
        transport.deliver("a@x.com", "Hi", "<p>Hi</p>").await.unwrap();
    }
}
