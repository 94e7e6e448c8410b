//! Fire-and-forget notification side channel.
//!
//! Alerts are rendered and dispatched on a spawned task after they are
//! persisted. Nothing here can fail a run or hold it up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use projwatch_core::Alert;
use projwatch_notify::{AlertContext, Dispatcher, TemplateContext, TemplateRenderer};

/// Why a notification is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Created,
    Escalated,
}

impl AlertEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEvent::Created => "created",
            AlertEvent::Escalated => "escalated",
        }
    }
}

#[derive(Clone)]
pub struct AlertNotifier {
    dispatcher: Arc<Dispatcher>,
    renderer: TemplateRenderer,
}

impl AlertNotifier {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Spawn delivery for `alerts` and return immediately.
    pub fn spawn(&self, alerts: Vec<Alert>, event: AlertEvent, now: DateTime<Utc>) -> Option<JoinHandle<usize>> {
        if alerts.is_empty() || self.dispatcher.is_empty() {
            return None;
        }
        let notifier = self.clone();
        Some(tokio::spawn(async move { notifier.deliver(&alerts, event, now).await }))
    }

    /// Deliver inline; returns how many channel sends succeeded.
    pub async fn deliver(&self, alerts: &[Alert], event: AlertEvent, now: DateTime<Utc>) -> usize {
        let mut delivered = 0;
        for alert in alerts {
            let ctx = template_context(alert, event, now);
            let notification = match self.renderer.render_notification(&ctx) {
                Ok(n) => n,
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "Notification render failed");
                    continue;
                }
            };
            for result in self.dispatcher.dispatch(alert.kind().as_str(), &notification).await {
                if result.success {
                    delivered += 1;
                } else {
                    warn!(
                        alert_id = %alert.id,
                        channel = %result.channel,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Notification delivery failed"
                    );
                }
            }
        }
        debug!(alerts = alerts.len(), delivered, event = event.as_str(), "Notifications sent");
        delivered
    }
}

pub fn template_context(alert: &Alert, event: AlertEvent, now: DateTime<Utc>) -> TemplateContext {
    TemplateContext {
        alert: AlertContext {
            id: alert.id.to_string(),
            alert_type: alert.alert_type.to_string(),
            kind: alert.kind().as_str().to_string(),
            severity: alert.severity.to_string(),
            recipient_id: alert.recipient_id.clone(),
            entity_id: alert.entity_id.clone(),
            agency_id: alert.agency_id.clone(),
            message: alert.message.clone(),
            escalation_level: alert.escalation_level.as_u8(),
        },
        event: event.as_str().to_string(),
        now: now.to_rfc3339(),
    }
}
