//! Minijinja template rendering for notification messages.
//!
//! Renders notification subject and body templates using minijinja,
//! with access to the alert record and the event that produced it.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use std::collections::HashMap;

use crate::traits::{Notification, NotifyError};

/// Subject used when no custom template is configured.
pub const DEFAULT_SUBJECT: &str =
    "[{{ alert.severity | upper }}]{% if alert.escalation_level > 0 %} (escalation L{{ alert.escalation_level }}){% endif %} {{ alert.alert_type }} on {{ alert.entity_id }}";

/// Body used when no custom template is configured.
pub const DEFAULT_BODY: &str = "{{ alert.message }}\n\nProject: {{ alert.entity_id }}{% if alert.agency_id %}\nAgency: {{ alert.agency_id }}{% endif %}\nEvent: {{ event }} at {{ now }}";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub alert: AlertContext,
    /// Event type: `"created"` or `"escalated"`.
    pub event: String,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// Alert fields exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertContext {
    pub id: String,
    /// Prefixed wire type, e.g. `escalated_milestone_overdue`.
    pub alert_type: String,
    /// Base rule name.
    pub kind: String,
    pub severity: String,
    pub recipient_id: String,
    pub entity_id: String,
    pub agency_id: Option<String>,
    pub message: String,
    pub escalation_level: u8,
}

/// Renders notification templates using minijinja.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    subject_template: String,
    body_template: String,
}

impl TemplateRenderer {
    /// Create a renderer with the default subject and body.
    pub fn new() -> Self {
        Self {
            subject_template: DEFAULT_SUBJECT.to_string(),
            body_template: DEFAULT_BODY.to_string(),
        }
    }

    /// Create a renderer with custom subject and body templates.
    pub fn with_templates(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject_template: subject.into(),
            body_template: body.into(),
        }
    }

    /// Build a minijinja environment with the filters the default templates use.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        // Registered explicitly so it exists regardless of builtin features.
        env.add_filter("upper", upper_filter);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Render the configured subject and body into a [`Notification`].
    pub fn render_notification(&self, ctx: &TemplateContext) -> Result<Notification, NotifyError> {
        let subject = self.render(&self.subject_template, ctx)?;
        let body = self.render(&self.body_template, ctx)?;

        let mut metadata = HashMap::from([
            ("alert_id".to_string(), ctx.alert.id.clone()),
            ("alert_type".to_string(), ctx.alert.alert_type.clone()),
            ("severity".to_string(), ctx.alert.severity.clone()),
            ("entity_id".to_string(), ctx.alert.entity_id.clone()),
            ("event".to_string(), ctx.event.clone()),
        ]);
        if let Some(agency) = &ctx.alert.agency_id {
            metadata.insert("agency_id".to_string(), agency.clone());
        }

        Ok(Notification {
            recipient: ctx.alert.recipient_id.clone(),
            subject,
            body,
            metadata,
        })
    }

    /// Validate that a template string parses without errors.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}
