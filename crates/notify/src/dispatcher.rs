//! Routes rendered notifications to channels by alert kind.
//!
//! Each base rule name can have its own channel list; anything without one
//! goes to the fallback list. Channels for one notification are driven
//! concurrently and a failing channel never stops the others.

use std::collections::HashMap;
use std::time::Instant;

use futures::future::join_all;

use crate::traits::{DispatchResult, Notification, Notifier};

type Channels = Vec<Box<dyn Notifier>>;

pub struct Dispatcher {
    /// Base rule name (e.g. `milestone_overdue`) to channels.
    routes: HashMap<String, Channels>,
    fallback: Channels,
}

impl Dispatcher {
    pub fn new(routes: HashMap<String, Channels>) -> Self {
        Self {
            routes,
            fallback: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Every kind goes to the same channels.
    pub fn with_defaults(channels: Channels) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: channels,
        }
    }

    /// Replace the channels for one kind.
    pub fn set_kind_channels(&mut self, kind: String, channels: Channels) {
        self.routes.insert(kind, channels);
    }

    pub fn is_empty(&self) -> bool {
        self.fallback.is_empty() && self.routes.values().all(Vec::is_empty)
    }

    fn channels_for(&self, kind: &str) -> &[Box<dyn Notifier>] {
        self.routes.get(kind).unwrap_or(&self.fallback)
    }

    /// Send to every channel routed for `kind`; one result per channel.
    pub async fn dispatch(&self, kind: &str, notification: &Notification) -> Vec<DispatchResult> {
        let channels = self.channels_for(kind);
        if channels.is_empty() {
            tracing::debug!(kind, "No notification channels configured");
            return Vec::new();
        }
        join_all(
            channels
                .iter()
                .map(|channel| deliver(channel.as_ref(), kind, notification)),
        )
        .await
    }
}

async fn deliver(channel: &dyn Notifier, kind: &str, notification: &Notification) -> DispatchResult {
    let started = Instant::now();
    let outcome = channel.send(notification).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    let alert_id = notification
        .metadata
        .get("alert_id")
        .cloned()
        .unwrap_or_default();

    if let Err(e) = &outcome {
        tracing::warn!(
            kind,
            channel = channel.channel_name(),
            recipient = %notification.recipient,
            error = %e,
            duration_ms,
            "Notification delivery failed"
        );
    } else {
        tracing::debug!(kind, channel = channel.channel_name(), duration_ms, "Notification delivered");
    }

    DispatchResult {
        channel: channel.channel_name().to_string(),
        alert_id,
        success: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Delivery("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn notification() -> Notification {
        Notification {
            recipient: "officer-1".to_string(),
            subject: "test".to_string(),
            body: "test body".to_string(),
            metadata: HashMap::from([("alert_id".to_string(), "a-1".to_string())]),
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier {
                name: "a".to_string(),
                send_count: count_a.clone(),
                should_fail: false,
            }),
            Box::new(MockNotifier {
                name: "b".to_string(),
                send_count: count_b.clone(),
                should_fail: false,
            }),
        ];

        let mut dispatcher = Dispatcher::empty();
        dispatcher.set_kind_channels("milestone_overdue".to_string(), channels);

        let results = dispatcher.dispatch("milestone_overdue", &notification()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].alert_id, "a-1");
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));

        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
            }),
            Box::new(MockNotifier {
                name: "ok".to_string(),
                send_count: count.clone(),
                should_fail: false,
            }),
        ];

        let dispatcher = Dispatcher::with_defaults(channels);

        let results = dispatcher.dispatch("slow_review", &notification()).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_channels_returns_empty() {
        let dispatcher = Dispatcher::empty();
        assert!(dispatcher.is_empty());
        let results = dispatcher.dispatch("inactive_entity", &notification()).await;
        assert!(results.is_empty());
    }
}
