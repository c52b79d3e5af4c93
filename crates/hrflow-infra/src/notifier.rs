//! Log-only notification sink.

use hrflow_core::notify::Notifier;
use hrflow_types::error::NotifyError;
use hrflow_types::event::NotificationEvent;

/// Writes every event to the tracing log. Never fails.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            event_id = %event.id,
            kind = %event.kind,
            instance_id = %event.instance_id,
            recipients = ?event.recipient_ids,
            "notification"
        );
        Ok(())
    }
}
