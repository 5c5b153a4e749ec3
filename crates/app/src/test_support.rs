//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hushbot_domain::error::{Capability, HushbotError, PermissionDenied, ProviderError};
use hushbot_domain::event::{Event, EventType};
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;

use crate::ports::{EventPublisher, GeofencingProvider, LocationProvider, NotificationPolicyController};
use crate::transition_channel::TransitionSink;

// ── Geofencing ─────────────────────────────────────────────────

pub struct FakeGeofencing {
    pub location_granted: AtomicBool,
    pub fail_with: Mutex<Option<ProviderError>>,
    pub regions: Mutex<HashMap<GeofenceId, TransitionSink>>,
    pub calls: Mutex<Vec<String>>,
    /// Scheduler yields before `remove_region` answers.
    pub remove_yields: AtomicUsize,
}

impl Default for FakeGeofencing {
    fn default() -> Self {
        Self {
            location_granted: AtomicBool::new(true),
            fail_with: Mutex::new(None),
            regions: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            remove_yields: AtomicUsize::new(0),
        }
    }
}

impl FakeGeofencing {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.regions
            .lock()
            .unwrap()
            .contains_key(&GeofenceId::from_name(id).unwrap())
    }
}

impl GeofencingProvider for FakeGeofencing {
    fn add_region(
        &self,
        geofence: Geofence,
        sink: TransitionSink,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        self.calls.lock().unwrap().push(format!("add:{}", geofence.id));
        let result = if !self.location_granted.load(Ordering::SeqCst) {
            Err(PermissionDenied {
                capability: Capability::Location,
            }
            .into())
        } else if let Some(err) = self.fail_with.lock().unwrap().clone() {
            Err(err.into())
        } else {
            self.regions.lock().unwrap().insert(geofence.id, sink);
            Ok(())
        };
        async { result }
    }

    fn remove_region(
        &self,
        id: GeofenceId,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        self.calls.lock().unwrap().push(format!("remove:{id}"));
        let result = match self.regions.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(ProviderError::RegionNotFound.into()),
        };
        let yields = self.remove_yields.load(Ordering::SeqCst);
        async move {
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }
            result
        }
    }
}

// ── Location ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeLocation {
    pub position: Mutex<Option<Coordinates>>,
}

impl LocationProvider for FakeLocation {
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Coordinates>, HushbotError>> + Send {
        let position = *self.position.lock().unwrap();
        async move { Ok(position) }
    }
}

// ── Notification policy ────────────────────────────────────────

pub struct FakePolicy {
    pub granted: AtomicBool,
    pub unavailable: AtomicBool,
    pub dnd: AtomicBool,
    pub writes: AtomicUsize,
}

impl Default for FakePolicy {
    fn default() -> Self {
        Self {
            granted: AtomicBool::new(true),
            unavailable: AtomicBool::new(false),
            dnd: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }
}

impl FakePolicy {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn dnd(&self) -> bool {
        self.dnd.load(Ordering::SeqCst)
    }
}

impl NotificationPolicyController for FakePolicy {
    fn has_write_capability(&self) -> impl Future<Output = bool> + Send {
        let granted = self.granted.load(Ordering::SeqCst);
        async move { granted }
    }

    fn interruption_filter_enabled(
        &self,
    ) -> impl Future<Output = Result<bool, HushbotError>> + Send {
        let dnd = self.dnd.load(Ordering::SeqCst);
        async move { Ok(dnd) }
    }

    fn set_interruption_filter(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        let result = if self.unavailable.load(Ordering::SeqCst) {
            Err(HushbotError::PolicyUnavailable("store offline".to_string()))
        } else {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.dnd.store(enabled, Ordering::SeqCst);
            Ok(())
        };
        async { result }
    }
}

// ── Spy publisher ──────────────────────────────────────────────

#[derive(Default)]
pub struct SpyPublisher {
    pub events: Mutex<Vec<Event>>,
    /// Scheduler yields before each publish completes.
    pub yields: AtomicUsize,
}

impl SpyPublisher {
    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventPublisher for SpyPublisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HushbotError>> + Send {
        self.events.lock().unwrap().push(event);
        let yields = self.yields.load(Ordering::SeqCst);
        async move {
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }
            Ok(())
        }
    }
}

pub fn geofence(name: &str, latitude: f64, longitude: f64, radius: f64) -> Geofence {
    Geofence::builder()
        .name(name)
        .center(latitude, longitude)
        .radius_meters(radius)
        .build()
        .unwrap()
}

pub fn id(name: &str) -> GeofenceId {
    GeofenceId::from_name(name).unwrap()
}
