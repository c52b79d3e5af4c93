//! Notification dispatch port.
//!
//! The engine hands a [`NotificationEvent`] to a [`Notifier`] after every
//! committed transition. Delivery is best-effort: a failure is reported back
//! to the caller as a warning and never undoes the transition.
//!
//! [`BoxNotifier`] erases the concrete notifier type (the trait uses RPITIT
//! and cannot be a trait object directly), and [`FanoutNotifier`] delivers
//! each event to several notifiers.

use std::future::Future;
use std::pin::Pin;

use futures_util::future::join_all;
use hrflow_types::error::NotifyError;
use hrflow_types::event::NotificationEvent;

/// Receives notification events after committed transitions.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        event: &NotificationEvent,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Object-safe version of [`Notifier`] with boxed futures.
pub trait NotifierDyn: Send + Sync {
    fn notify_boxed<'a>(
        &'a self,
        event: &'a NotificationEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

impl<T: Notifier> NotifierDyn for T {
    fn notify_boxed<'a>(
        &'a self,
        event: &'a NotificationEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(self.notify(event))
    }
}

/// Type-erased notifier for runtime composition.
pub struct BoxNotifier {
    inner: Box<dyn NotifierDyn + Send + Sync>,
}

impl BoxNotifier {
    pub fn new<T: Notifier + 'static>(notifier: T) -> Self {
        Self {
            inner: Box::new(notifier),
        }
    }
}

impl Notifier for BoxNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.inner.notify_boxed(event).await
    }
}

impl std::fmt::Debug for BoxNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNotifier").finish_non_exhaustive()
    }
}

/// Delivers each event to every inner notifier concurrently.
///
/// All sinks are attempted even when some fail; the failures are merged into
/// a single `Delivery` error.
#[derive(Debug, Default)]
pub struct FanoutNotifier {
    sinks: Vec<BoxNotifier>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Notifier + 'static>(mut self, notifier: T) -> Self {
        self.sinks.push(BoxNotifier::new(notifier));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let results = join_all(self.sinks.iter().map(|sink| sink.notify(event))).await;
        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingNotifier, RecordingNotifier};
    use hrflow_types::event::NotificationKind;
    use hrflow_types::instance::InstanceId;

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            NotificationKind::ApprovalNeeded,
            InstanceId::new(),
            vec!["bob".to_string()],
            serde_json::json!({"step_id": "manager"}),
        )
    }

    #[tokio::test]
    async fn box_notifier_delegates() {
        let recorder = RecordingNotifier::default();
        let boxed = BoxNotifier::new(recorder.clone());
        boxed.notify(&event()).await.unwrap();
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn fanout_reaches_all_sinks_despite_failure() {
        let first = RecordingNotifier::default();
        let second = RecordingNotifier::default();
        let fanout = FanoutNotifier::new()
            .with(first.clone())
            .with(FailingNotifier)
            .with(second.clone());
        assert_eq!(fanout.len(), 3);

        let err = fanout.notify(&event()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(_)));
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[tokio::test]
    async fn empty_fanout_succeeds() {
        let fanout = FanoutNotifier::new();
        assert!(fanout.is_empty());
        fanout.notify(&event()).await.unwrap();
    }
}
