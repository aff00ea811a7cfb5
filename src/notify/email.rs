// src/notify/email.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notification, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub login: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// One notifier per recipient, sending over STARTTLS.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    label: String,
}

impl EmailNotifier {
    pub fn new(smtp: &SmtpSettings, recipient: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .with_context(|| format!("invalid SMTP_SERVER {}", smtp.host))?
            .port(smtp.port);
        if let (Some(login), Some(password)) = (&smtp.login, &smtp.password) {
            builder = builder.credentials(Credentials::new(login.clone(), password.clone()));
        }

        let from: Mailbox = smtp
            .from
            .parse()
            .with_context(|| format!("invalid EMAIL_FROM {}", smtp.from))?;
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("invalid recipient {recipient}"))?;

        let label = format!("email:{}", to.email);
        Ok(Self {
            mailer: builder.build(),
            from,
            to,
            label,
        })
    }

    pub fn build_message(&self, n: &Notification) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(n.title.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(n.body.clone())
            .context("build email")
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        let msg = self.build_message(n)?;
        self.mailer.send(msg).await.context("send email")?;
        tracing::info!(to = %self.to, "email notification sent");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
