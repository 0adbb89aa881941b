//! Outbound SMTP mail. The authentication core only depends on this for
//! best-effort notifications; a send failure is logged and isolated,
//! never propagated into the request outcome.

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::config::MailConfig;

/// System mailer for welcome mails, login alerts, and one-time codes.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    from_name: String,
    /// In development, codes and notifications are logged instead of sent.
    dev_mode: bool,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from_address", &self.from_address)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}

impl Mailer {
    pub fn from_config(config: &MailConfig, dev_mode: bool) -> Result<Self> {
        let transport = if config.enabled {
            Some(build_transport(
                &config.smtp_host,
                config.smtp_port,
                config.tls,
                Some((config.username.clone(), config.password.clone())),
            )?)
        } else {
            None
        };

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
            dev_mode,
        })
    }

    /// Send an HTML mail through the system transport.
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        if self.dev_mode {
            info!(to, subject, "Mail (development mode, not sent): {html}");
            return Ok(());
        }

        let Some(transport) = &self.transport else {
            anyhow::bail!("Mail transport is not configured");
        };

        let message = build_message(&self.from_name, &self.from_address, to, subject, html)?;

        debug!(to, subject, "sending mail");
        transport
            .send(message)
            .await
            .context("SMTP send failed")?;

        Ok(())
    }

    /// Best-effort variant: failures are logged and swallowed so a
    /// notification can never fail the request that triggered it.
    pub async fn notify(&self, to: &str, subject: &str, html: &str) {
        if let Err(e) = self.send(to, subject, html).await {
            warn!(to, subject, "Failed to send notification email: {e:#}");
        }
    }
}

/// One-off relay send on behalf of a newsletter provider, using the
/// provider's own relay credentials (the password was just decrypted
/// with the operator-supplied provider password).
pub async fn send_via_relay(
    relay_host: &str,
    relay_address: &str,
    relay_password: &str,
    sender_name: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<()> {
    let transport = build_transport(
        relay_host,
        587,
        true,
        Some((relay_address.to_string(), relay_password.to_string())),
    )?;

    let message = build_message(sender_name, relay_address, to, subject, html)?;

    transport
        .send(message)
        .await
        .context("Relay SMTP send failed")?;

    Ok(())
}

fn build_message(
    from_name: &str,
    from_address: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<Message> {
    let from: Mailbox = format!("{from_name} <{from_address}>")
        .parse()
        .context("Invalid sender address")?;
    let to: Mailbox = to.parse().context("Invalid recipient address")?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())
        .context("Failed to build email")
}

fn build_transport(
    host: &str,
    port: u16,
    tls: bool,
    credentials: Option<(String, String)>,
) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("SMTP TLS relay error")?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
    };

    let builder = builder.port(port);

    let builder = match credentials {
        Some((user, pass)) if !user.is_empty() => {
            builder.credentials(Credentials::new(user, pass))
        }
        _ => builder,
    };

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_message_html() {
        let message = build_message(
            "Gatehouse",
            "no-reply@example.com",
            "someone@example.com",
            "Welcome",
            "<p>hello</p>",
        );
        assert!(message.is_ok());
    }

    #[test]
    fn build_message_invalid_recipient() {
        let message = build_message(
            "Gatehouse",
            "no-reply@example.com",
            "not-an-address",
            "Welcome",
            "<p>hello</p>",
        );
        assert!(message.is_err());
    }

    #[test]
    fn build_transport_without_tls() {
        let result = build_transport("localhost", 2525, false, None);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dev_mode_send_is_a_no_op() {
        let mailer = Mailer::from_config(&MailConfig::default(), true).unwrap();
        assert!(
            mailer
                .send("someone@example.com", "Test", "<p>body</p>")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unconfigured_transport_errors_in_production_mode() {
        let mailer = Mailer::from_config(&MailConfig::default(), false).unwrap();
        assert!(
            mailer
                .send("someone@example.com", "Test", "<p>body</p>")
                .await
                .is_err()
        );
    }
}
