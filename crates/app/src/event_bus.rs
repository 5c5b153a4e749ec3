//! In-process event bus backed by a tokio broadcast channel.
//!
//! Broadcast receivers only see what is published after they subscribe, so a
//! UI attaching late would not know whether DND is currently on. The bus
//! therefore keeps the last `PolicyApplied` event for such subscribers.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use hushbot_domain::error::HushbotError;
use hushbot_domain::event::{Event, EventType};

use crate::ports::EventPublisher;

/// Engine event bus.
///
/// Publishing never fails: with no subscriber the event is dropped, and a
/// slow subscriber lags instead of blocking the engine.
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
    last_policy_applied: Mutex<Option<Event>>,
}

impl InProcessEventBus {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            last_policy_applied: Mutex::new(None),
        }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// The most recent DND change, if any was published.
    #[must_use]
    pub fn last_policy_applied(&self) -> Option<Event> {
        self.last_policy_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HushbotError>> + Send {
        tracing::trace!(
            event_type = %event.event_type,
            geofence_id = ?event.geofence_id.as_ref().map(ToString::to_string),
            "publishing engine event"
        );
        if event.event_type == EventType::PolicyApplied {
            *self
                .last_policy_applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(event.clone());
        }
        // send only fails when nobody listens
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}
