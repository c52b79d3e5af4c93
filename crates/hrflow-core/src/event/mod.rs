//! In-process event bus for notification events.
//!
//! Provides an `EventBus` that distributes `NotificationEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
