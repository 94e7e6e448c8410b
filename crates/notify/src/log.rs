//! Channel that writes notifications to the tracing log.
//!
//! Used when no real transport is configured, so operators can still see
//! what would have been sent.

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient,
            alert_id = notification.metadata.get("alert_id").map(String::as_str).unwrap_or(""),
            subject = %notification.subject,
            "notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    #[tokio::test]
    async fn log_channel_always_succeeds() {
        let notifier = LogNotifier::new();
        let notification = Notification {
            recipient: "officer-north".to_string(),
            subject: "[CRITICAL] milestone_overdue on bridge-42".to_string(),
            body: "1 milestone(s) overdue".to_string(),
            metadata: HashMap::from([("alert_id".to_string(), "7d3c".to_string())]),
        };
        assert!(notifier.send(&notification).await.is_ok());
        assert_eq!(notifier.channel_name(), "log");
    }
}
