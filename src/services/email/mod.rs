// Email Service Module (TES-88)
// Main orchestration module that coordinates builders and sender

pub mod builders;
pub mod sender;
pub mod types;

use self::types::EmailBuilder;
use crate::app_config::EmailConfig;
use builders::{TenantLaunchFailedEmailBuilder, TenantLaunchedEmailBuilder};
use handlebars::Handlebars;
use sender::EmailSender;
use std::sync::Arc;
use tracing::{info, instrument};

/// Email service for tenant lifecycle notifications
#[derive(Clone)]
pub struct EmailService {
    sender: EmailSender,
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
}

impl EmailService {
    /// Create a new email service instance
    pub fn new(config: EmailConfig) -> Result<Self, types::EmailError> {
        let mut templates = Handlebars::new();
        Self::register_templates(&mut templates)?;

        let sender =
            EmailSender::new_resend(config.resend_api_key.clone(), config.resend_api_url.clone())
                .with_max_retries(3)
                .with_retry_delay(std::time::Duration::from_secs(1));

        Ok(Self {
            sender,
            config,
            templates: Arc::new(templates),
        })
    }

    /// Register all email templates
    fn register_templates(templates: &mut Handlebars) -> Result<(), types::EmailError> {
        let launched_template = include_str!("../../templates/email/tenant_launched.html");
        templates
            .register_template_string("tenant_launched", launched_template)
            .map_err(|e| types::EmailError::TemplateError(e.to_string()))?;

        let failed_template = include_str!("../../templates/email/tenant_launch_failed.html");
        templates
            .register_template_string("tenant_launch_failed", failed_template)
            .map_err(|e| types::EmailError::TemplateError(e.to_string()))?;

        Ok(())
    }

    /// Notify a tenant admin that their site is live
    #[instrument(skip(self))]
    pub async fn send_tenant_launched(
        &self,
        to_email: &str,
        tenant_name: &str,
        site_url: &str,
    ) -> Result<(), types::EmailError> {
        info!("Sending launch notification to {}", to_email);

        let builder = TenantLaunchedEmailBuilder::new(
            to_email,
            tenant_name,
            site_url,
            &self.config,
            &self.templates,
        );

        let message = builder.build()?;
        self.sender.send_with_retry(message).await
    }

    /// Notify a tenant admin that their launch stopped
    #[instrument(skip(self, failure_reason))]
    pub async fn send_tenant_launch_failed(
        &self,
        to_email: &str,
        tenant_name: &str,
        slug: &str,
        failure_reason: &str,
    ) -> Result<(), types::EmailError> {
        info!("Sending launch failure notification to {}", to_email);

        let builder = TenantLaunchFailedEmailBuilder::new(
            to_email,
            tenant_name,
            slug,
            failure_reason,
            &self.config,
            &self.templates,
        );

        let message = builder.build()?;
        self.sender.send_with_retry(message).await
    }

    /// Perform a health check on the email service
    pub async fn health_check(&self) -> Result<(), EmailError> {
        self.sender.health_check().await
    }
}

// Re-export commonly used types for convenience
pub use types::{EmailError, EmailMessage};
