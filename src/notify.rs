//! Notification mail for approved reset requests.
//!
//! The record is already on disk when a notification goes out, so delivery
//! failures are reported to the caller as a warning rather than undoing the
//! submission. `EmailSender` is the delivery seam: `SmtpEmailSender` talks to a
//! relay through `lettre`, `LogEmailSender` only logs and is used when no relay
//! host is configured.

use crate::model::{ResetRequest, Sponsor};
use anyhow::{Context, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials as SmtpCredentials,
    Message, SmtpTransport, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
    #[error("notification task failed: {0}")]
    Task(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Sender that logs the message instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            cc = ?message.cc,
            subject = %message.subject,
            body = %message.body,
            "notification send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    host: Option<String>,
    port: u16,
    starttls: bool,
    username: Option<String>,
    password: Option<SecretString>,
    timeout: Duration,
    from: String,
    ops_address: String,
}

impl MailConfig {
    /// Default config: no relay (log only), port 25, plain SMTP, 30s timeout.
    #[must_use]
    pub fn new(from: &str, ops_address: &str) -> Self {
        Self {
            host: None,
            port: 25,
            starttls: false,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            from: from.to_string(),
            ops_address: ops_address.to_string(),
        }
    }

    #[must_use]
    pub fn with_relay(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: &str, password: SecretString) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password);
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn starttls(&self) -> bool {
        self.starttls
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn ops_address(&self) -> &str {
        &self.ops_address
    }
}

/// SMTP relay sender.
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// # Errors
    /// Returns an error if no relay host is configured, the from address is
    /// invalid or the TLS parameters cannot be built.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let host = config.host().context("no SMTP relay host configured")?;
        let from: Mailbox = config
            .from()
            .parse()
            .with_context(|| format!("invalid from address: {}", config.from()))?;

        let builder = if config.starttls() {
            SmtpTransport::starttls_relay(host)
                .with_context(|| format!("failed to configure STARTTLS for {host}"))?
        } else {
            SmtpTransport::builder_dangerous(host)
        };

        let mut builder = builder.port(config.port()).timeout(Some(config.timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(SmtpCredentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(message
                .to
                .parse()
                .with_context(|| format!("invalid recipient: {}", message.to))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for cc in &message.cc {
            builder = builder.cc(cc
                .parse()
                .with_context(|| format!("invalid cc recipient: {cc}"))?);
        }
        let email = builder
            .body(message.body.clone())
            .context("failed to build notification")?;

        self.transport
            .send(&email)
            .context("SMTP relay refused the notification")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn EmailSender>,
    ops_address: String,
}

impl Notifier {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>, ops_address: &str) -> Self {
        Self {
            sender,
            ops_address: ops_address.to_string(),
        }
    }

    /// Pick the SMTP sender when a relay host is configured, the log sender
    /// otherwise.
    ///
    /// # Errors
    /// Returns an error if the SMTP sender cannot be built.
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let sender: Arc<dyn EmailSender> = if config.host().is_some() {
            Arc::new(SmtpEmailSender::new(config)?)
        } else {
            warn!("no SMTP relay configured, notifications will only be logged");
            Arc::new(LogEmailSender)
        };
        Ok(Self::new(sender, config.ops_address()))
    }

    #[must_use]
    pub fn compose(&self, sponsor: &Sponsor, request: &ResetRequest) -> EmailMessage {
        EmailMessage {
            to: sponsor.email.clone(),
            cc: vec![self.ops_address.clone()],
            subject: format!("Password reset request for {}", request.target),
            body: format!(
                "A password reset was requested by {sponsor} for the account {target}.\n\n\
                 Account: {target}\n\
                 Employee ID: {employee_id}\n\
                 Service code: {service_code}\n",
                sponsor = sponsor.account,
                target = request.target,
                employee_id = request.employee_id,
                service_code = request.service_code,
            ),
        }
    }

    /// Deliver the notification on the blocking pool.
    ///
    /// # Errors
    /// Returns `NotifyError` if the sender fails or the task cannot complete.
    #[instrument(skip_all, fields(sponsor = %sponsor.account, target = %request.target))]
    pub async fn notify(&self, sponsor: &Sponsor, request: &ResetRequest) -> Result<(), NotifyError> {
        let message = self.compose(sponsor, request);
        let sender = Arc::clone(&self.sender);

        match tokio::task::spawn_blocking(move || sender.send(&message)).await {
            Ok(Ok(())) => {
                info!("notification sent");
                Ok(())
            }
            Ok(Err(err)) => {
                warn!("notification failed: {err:#}");
                Err(NotifyError::Delivery(format!("{err:#}")))
            }
            Err(err) => Err(NotifyError::Task(err.to_string())),
        }
    }
}
