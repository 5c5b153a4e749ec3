//! Event bus port: publish/subscribe for engine events.

use std::future::Future;

use hushbot_domain::error::HushbotError;
use hushbot_domain::event::Event;

/// Publishes engine events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HushbotError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HushbotError>> + Send {
        (**self).publish(event)
    }
}
