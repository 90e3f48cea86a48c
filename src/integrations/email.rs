use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::EmailConfig,
    domain::SubmissionMode,
    error::{AppError, Result},
    integrations::{EntitlementNotification, Notifier},
};

/// Transactional email on successful payment: a receipt to the payer and
/// a heads-up to the listings team. Content is deliberately minimal;
/// full templating lives with the rest of the site, not here.
pub struct EmailNotifier {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: Option<EmailConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if !cfg.enabled {
                return None;
            }
            let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host) {
                Ok(builder) => builder
                    .credentials(Credentials::new(
                        cfg.smtp_username.clone(),
                        cfg.smtp_password.clone(),
                    ))
                    .build(),
                Err(e) => {
                    tracing::warn!("Email notifier disabled, bad SMTP relay: {}", e);
                    return None;
                }
            };
            Some(Self {
                config: cfg,
                transport,
            })
        })
    }

    fn mailbox(address: &str) -> Result<Mailbox> {
        address
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid email address: {}", e)))
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let message = Message::builder()
            .from(Self::mailbox(&self.config.from_address)?)
            .to(Self::mailbox(to)?)
            .subject(subject)
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::External(format!("SMTP error: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "Email"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn notify(&self, event: &EntitlementNotification) -> Result<()> {
        let (subject, body) = match event.mode {
            SubmissionMode::New => (
                "Your venue listing is paid",
                format!(
                    "Payment received for \"{}\". The listing is awaiting review and is paid up until {}.",
                    event.venue_name,
                    event.expires_at.format("%Y-%m-%d")
                ),
            ),
            SubmissionMode::Claim => (
                "Your venue claim was received",
                format!(
                    "Payment received for your claim on \"{}\". Our team will review it shortly.",
                    event.venue_name
                ),
            ),
        };

        self.send(&event.user_email, subject, body).await?;

        self.send(
            &self.config.admin_address,
            "New paid submission",
            format!(
                "{} submission for venue \"{}\" ({}) by {}.",
                event.mode, event.venue_name, event.venue_id, event.user_email
            ),
        )
        .await
    }
}
