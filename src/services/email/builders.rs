// Email Builders - Builders for different types of emails (TES-88)
// Each builder knows how to construct its specific email type

use super::types::{
    EmailBuilder, EmailError, EmailMessage, TenantLaunchFailedEmailData, TenantLaunchedEmailData,
};
use crate::app_config::EmailConfig;
use handlebars::Handlebars;
use tracing::instrument;

/// Builder for the "your site is live" notification
pub struct TenantLaunchedEmailBuilder<'a> {
    to_email: &'a str,
    tenant_name: &'a str,
    site_url: &'a str,
    config: &'a EmailConfig,
    templates: &'a Handlebars<'a>,
}

impl<'a> TenantLaunchedEmailBuilder<'a> {
    pub fn new(
        to_email: &'a str,
        tenant_name: &'a str,
        site_url: &'a str,
        config: &'a EmailConfig,
        templates: &'a Handlebars<'a>,
    ) -> Self {
        Self {
            to_email,
            tenant_name,
            site_url,
            config,
            templates,
        }
    }
}

impl<'a> EmailBuilder for TenantLaunchedEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = TenantLaunchedEmailData {
            tenant_name: self.tenant_name.to_string(),
            site_url: self.site_url.to_string(),
            dashboard_url: self.config.dashboard_url.clone(),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = self
            .templates
            .render("tenant_launched", &data)
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        let text = format!(
            "Hi,\n\n\
            {} is live!\n\n\
            Your new site is ready at:\n\
            {}\n\n\
            Manage it from your dashboard:\n\
            {}\n\n\
            If anything looks wrong, contact us at {}.\n\n\
            Best regards,\n\
            The {} Team",
            self.tenant_name,
            self.site_url,
            self.config.dashboard_url,
            self.config.support_email,
            self.config.from_name
        );

        Ok(EmailMessage::new(
            format!("{} <{}>", self.config.from_name, self.config.from_email),
            vec![self.to_email.to_string()],
            format!("{} is live on {}", self.tenant_name, self.config.from_name),
            html,
        )
        .with_text(text))
    }
}

/// Builder for the launch failure notification
pub struct TenantLaunchFailedEmailBuilder<'a> {
    to_email: &'a str,
    tenant_name: &'a str,
    slug: &'a str,
    failure_reason: &'a str,
    config: &'a EmailConfig,
    templates: &'a Handlebars<'a>,
}

impl<'a> TenantLaunchFailedEmailBuilder<'a> {
    pub fn new(
        to_email: &'a str,
        tenant_name: &'a str,
        slug: &'a str,
        failure_reason: &'a str,
        config: &'a EmailConfig,
        templates: &'a Handlebars<'a>,
    ) -> Self {
        Self {
            to_email,
            tenant_name,
            slug,
            failure_reason,
            config,
            templates,
        }
    }
}

impl<'a> EmailBuilder for TenantLaunchFailedEmailBuilder<'a> {
    #[instrument(skip(self))]
    fn build(&self) -> Result<EmailMessage, EmailError> {
        let data = TenantLaunchFailedEmailData {
            tenant_name: self.tenant_name.to_string(),
            slug: self.slug.to_string(),
            failure_reason: self.failure_reason.to_string(),
            timestamp: chrono::Utc::now()
                .format("%B %d, %Y at %H:%M UTC")
                .to_string(),
            app_name: self.config.from_name.clone(),
            support_email: self.config.support_email.clone(),
        };

        let html = self
            .templates
            .render("tenant_launch_failed", &data)
            .map_err(|e| EmailError::TemplateError(e.to_string()))?;

        let text = format!(
            "Hi,\n\n\
            We could not finish setting up {} ({}).\n\n\
            What happened:\n\
            {}\n\n\
            The launch stopped on {} and the site has been put on hold. \
            Our team has been notified; you can also reach us at {} with the \
            site name for faster help.\n\n\
            Best regards,\n\
            The {} Team",
            self.tenant_name,
            self.slug,
            self.failure_reason,
            data.timestamp,
            self.config.support_email,
            self.config.from_name
        );

        Ok(EmailMessage::new(
            format!("{} <{}>", self.config.from_name, self.config.from_email),
            vec![self.to_email.to_string()],
            format!("Launch of {} needs attention", self.tenant_name),
            html,
        )
        .with_text(text)
        .with_reply_to(self.config.support_email.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_config() -> EmailConfig {
        EmailConfig {
            resend_api_key: "test_key".to_string(),
            resend_api_url: "https://api.resend.com/emails".to_string(),
            from_email: "noreply@tessera.site".to_string(),
            from_name: "Tessera Platform".to_string(),
            support_email: "support@tessera.site".to_string(),
            dashboard_url: "https://dashboard.tessera.site".to_string(),
        }
    }

    fn setup_test_templates() -> Handlebars<'static> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("tenant_launched", "Live at {{site_url}}")
            .unwrap();
        templates
            .register_template_string("tenant_launch_failed", "Failed: {{failure_reason}}")
            .unwrap();
        templates
    }

    #[test]
    fn test_launched_email_builder() {
        let config = setup_test_config();
        let templates = setup_test_templates();
        let builder = TenantLaunchedEmailBuilder::new(
            "admin@acme.test",
            "Acme Sites",
            "https://acme.tessera.site",
            &config,
            &templates,
        );

        let message = builder.build().unwrap();
        assert_eq!(message.to, vec!["admin@acme.test"]);
        assert_eq!(message.subject, "Acme Sites is live on Tessera Platform");
        assert!(message.html.contains("https://acme.tessera.site"));
        assert!(message.text.unwrap().contains("https://acme.tessera.site"));
    }

    #[test]
    fn test_launch_failed_email_builder() {
        let config = setup_test_config();
        let templates = setup_test_templates();
        let builder = TenantLaunchFailedEmailBuilder::new(
            "admin@acme.test",
            "Acme Sites",
            "acme",
            "migration '0002_content' failed",
            &config,
            &templates,
        );

        let message = builder.build().unwrap();
        assert_eq!(message.subject, "Launch of Acme Sites needs attention");
        assert!(message.html.contains("migration '0002_content' failed"));
        assert_eq!(message.reply_to, Some("support@tessera.site".to_string()));
    }
}
