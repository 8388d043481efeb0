use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use crate::config::Config;
use crate::services::retry::RetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email message: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Send(String),
}

/// Async SMTP sender. Without an SMTP host it runs in no-op mode and only
/// logs, so development and tests need no mail infrastructure.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    frontend_url: String,
    retry: RetryConfig,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, EmailError> {
        let from = config
            .email_from
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(e.to_string()))?;

        let retry = RetryConfig::default();

        let transport = if config.smtp_host.trim().is_empty() {
            tracing::warn!("SMTP host not configured; email service running in no-op mode");
            None
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| EmailError::Send(e.to_string()))?
                    .port(config.smtp_port)
                    .timeout(Some(retry.timeout()));

            if !config.smtp_username.is_empty() {
                builder = builder.credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ));
            }

            Some(builder.build())
        };

        Ok(Self {
            transport,
            from,
            frontend_url: config.frontend_url.clone(),
            retry,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!("{}/verify-email?token={}", self.frontend_url, token);
        let body = format!(
            "Hi {name},\n\nPlease confirm your email address by opening the link below:\n{link}\n\nThe link is valid for 24 hours. If you did not create an account, ignore this email.",
        );
        self.send(to, "Verify your email address", body).await
    }

    pub async fn send_verification_success_email(
        &self,
        to: &str,
        name: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Hi {name},\n\nYour email address has been verified. You now have full access to your account.",
        );
        self.send(to, "Email verified", body).await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        let body = format!(
            "Hi {name},\n\nWe received a request to reset your password. Open the link below to choose a new one:\n{link}\n\nThis link will expire in 1 hour. If you did not request this, ignore this email or contact support.",
        );
        self.send(to, "Password reset request", body).await
    }

    pub async fn send_password_reset_notification(
        &self,
        to: &str,
        name: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Hi {name},\n\nYour password was just changed. If this was not you, contact support immediately.",
        );
        self.send(to, "Your password has been reset", body).await
    }

    pub async fn send_subscription_update_email(
        &self,
        to: &str,
        name: &str,
        plan_title: &str,
        end_date: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Hi {name},\n\nYour subscription is now on the {plan_title} plan, active until {end_date}.",
        );
        self.send(to, "Subscription updated", body).await
    }

    pub async fn send_payment_confirmation_email(
        &self,
        to: &str,
        name: &str,
        plan_title: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Hi {name},\n\nWe received your payment for the {plan_title} plan. Thank you!",
        );
        self.send(to, "Payment received", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), EmailError> {
        let Some(transport) = &self.transport else {
            tracing::info!(to, subject, "no-op email mode; skipping send");
            return Ok(());
        };

        let to_mailbox = to
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut attempt = 0;
        loop {
            match transport.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!(to, subject, "email sent");
                    return Ok(());
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.calculate_delay(attempt);
                    tracing::warn!(to, subject, attempt, error = %e, "email send failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(to, subject, error = %e, "email send failed");
                    return Err(EmailError::Send(e.to_string()));
                }
            }
        }
    }
}
