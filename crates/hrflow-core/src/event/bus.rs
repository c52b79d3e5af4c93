//! Broadcast event bus for distributing `NotificationEvent` to subscribers.
//!
//! The bus is also a [`Notifier`], so it can sit in a fan-out next to durable
//! sinks. Publishing with no active subscribers is a no-op.

use hrflow_types::error::NotifyError;
use hrflow_types::event::NotificationEvent;
use tokio::sync::broadcast;

use crate::notify::Notifier;

/// Multi-consumer bus for notification events.
///
/// Cloning the bus clones the sender, allowing multiple producers and consumers.
pub struct EventBus {
    sender: broadcast::Sender<NotificationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: NotificationEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Notifier for EventBus {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.publish(event.clone());
        Ok(())
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrflow_types::event::NotificationKind;
    use hrflow_types::instance::InstanceId;

    fn sample_event() -> NotificationEvent {
        NotificationEvent::new(
            NotificationKind::InstanceApproved,
            InstanceId::new(),
            vec!["alice".to_string()],
            serde_json::json!({"template_name": "ExpenseApproval"}),
        )
    }

    #[tokio::test]
    async fn notify_delivers_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.notify(&sample_event()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::InstanceApproved);
        assert_eq!(received.recipient_ids, vec!["alice"]);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(sample_event());

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_ok() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);
        bus.notify(&sample_event()).await.unwrap();
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(sample_event());

        assert!(rx.try_recv().is_ok());
        assert!(format!("{bus:?}").contains("receiver_count"));
    }
}
