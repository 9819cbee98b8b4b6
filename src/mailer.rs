use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{config::Config, errors::AppError};

/// Outbound SMTP. Without `SMTP_HOST` messages are only logged.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .map_err(|e| AppError::ConfigError(format!("SMTP_FROM is not a valid mailbox: {e}")))?;

        let transport = match &config.smtp {
            Some(smtp) => {
                let builder = if smtp.starttls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                        .map_err(|e| AppError::ConfigError(format!("SMTP relay error: {e}")))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
                };
                let builder = builder.port(smtp.port);
                let builder = match (&smtp.username, &smtp.password) {
                    (Some(user), Some(pass)) => {
                        builder.credentials(Credentials::new(user.clone(), pass.clone()))
                    }
                    _ => builder,
                };
                log::info!("SMTP transport configured for {}:{}", smtp.host, smtp.port);
                Some(builder.build())
            }
            None => {
                log::warn!("SMTP_HOST not set; outgoing mail will only be logged");
                None
            }
        };

        Ok(Mailer { transport, from })
    }

    pub async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), AppError> {
        let recipient = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient '{to}': {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| AppError::MailError(e.to_string()))?;

        match &self.transport {
            Some(transport) => {
                transport
                    .send(message)
                    .await
                    .map_err(|e| AppError::MailError(e.to_string()))?;
                log::info!("Mail '{}' sent to {}", subject, to);
            }
            None => log::info!("Mail '{}' to {} not sent (SMTP disabled)", subject, to),
        }
        Ok(())
    }

    /// Fire-and-log variant for notifications that must not fail the request.
    pub async fn notify(&self, to: &str, subject: &str, html: String) {
        if let Err(e) = self.send(to, subject, html).await {
            log::warn!("Notification '{}' to {} failed: {}", subject, to, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn disabled_transport_accepts_valid_recipients() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Mailer::from_config(&Config::for_tests(dir.path())).unwrap();
        assert!(mailer
            .send("employee@example.com", "Hello", "<p>hi</p>".to_owned())
            .await
            .is_ok());
        assert!(matches!(
            mailer.send("not-an-address", "Hello", String::new()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
