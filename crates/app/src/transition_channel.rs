//! Inbound provider channel.
//!
//! Providers (and the mock harness) push [`ProviderSignal`]s into a
//! [`TransitionSink`]; the engine drains the matching [`TransitionQueue`].
//! A single FIFO queue keeps every geofence's signals in the order the
//! provider observed them.

use tokio::sync::mpsc;

use hushbot_domain::id::GeofenceId;
use hushbot_domain::registration::RegistrationFailure;
use hushbot_domain::transition::TransitionEvent;

/// Something the provider reports asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignal {
    /// A boundary crossing.
    Transition(TransitionEvent),
    /// The provider stopped monitoring a region on its own (e.g. location
    /// was switched off).
    RegistrationLost {
        geofence_id: GeofenceId,
        failure: RegistrationFailure,
    },
}

/// Sending half, handed to providers when they register a region.
#[derive(Debug, Clone)]
pub struct TransitionSink {
    sender: mpsc::UnboundedSender<ProviderSignal>,
}

impl TransitionSink {
    /// Report a crossing. Returns `false` when the engine is gone.
    pub fn transition(&self, event: TransitionEvent) -> bool {
        self.send(ProviderSignal::Transition(event))
    }

    /// Report that a region is no longer monitored. Returns `false` when the
    /// engine is gone.
    pub fn registration_lost(&self, geofence_id: GeofenceId, failure: RegistrationFailure) -> bool {
        self.send(ProviderSignal::RegistrationLost {
            geofence_id,
            failure,
        })
    }

    fn send(&self, signal: ProviderSignal) -> bool {
        self.sender.send(signal).is_ok()
    }
}

/// Receiving half, consumed by the engine.
#[derive(Debug)]
pub struct TransitionQueue {
    receiver: mpsc::UnboundedReceiver<ProviderSignal>,
}

impl TransitionQueue {
    /// Wait for the next signal; `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<ProviderSignal> {
        self.receiver.recv().await
    }

    /// Take the next signal if one is already queued.
    pub fn try_recv(&mut self) -> Option<ProviderSignal> {
        self.receiver.try_recv().ok()
    }
}

/// Create a connected sink/queue pair.
#[must_use]
pub fn channel() -> (TransitionSink, TransitionQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (TransitionSink { sender }, TransitionQueue { receiver })
}
