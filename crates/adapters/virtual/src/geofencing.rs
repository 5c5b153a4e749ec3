//! Virtual geofencing provider: monitors regions against a simulated device
//! position and reports crossings like an OS provider would.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hushbot_app::ports::GeofencingProvider;
use hushbot_app::transition_channel::TransitionSink;
use hushbot_domain::clock::now;
use hushbot_domain::error::{
    Capability, HushbotError, NotFoundError, PermissionDenied, ProviderError,
};
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;
use hushbot_domain::registration::RegistrationFailure;
use hushbot_domain::transition::{TransitionEvent, TransitionKind};

/// Region limit of common mobile geofencing APIs.
pub const DEFAULT_MAX_REGIONS: usize = 100;

struct Region {
    geofence: Geofence,
    sink: TransitionSink,
    inside: bool,
}

struct ProviderState {
    location_granted: bool,
    max_regions: usize,
    position: Option<Coordinates>,
    regions: HashMap<GeofenceId, Region>,
}

/// A simulated geofencing provider.
///
/// Regions are matched against the position set with
/// [`VirtualGeofencingProvider::move_to`]; crossings are delivered to the
/// sink each region was registered with. Tests can also inject crossings
/// directly with [`VirtualGeofencingProvider::emit`].
pub struct VirtualGeofencingProvider {
    state: Mutex<ProviderState>,
}

impl Default for VirtualGeofencingProvider {
    fn default() -> Self {
        Self::with_max_regions(DEFAULT_MAX_REGIONS)
    }
}

impl VirtualGeofencingProvider {
    #[must_use]
    pub fn with_max_regions(max_regions: usize) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                location_granted: true,
                max_regions,
                position: None,
                regions: HashMap::new(),
            }),
        }
    }

    pub fn grant_location(&self) {
        self.lock_state().location_granted = true;
    }

    /// Revoke location access. Every monitored region is dropped and
    /// reported as lost.
    pub fn revoke_location(&self) {
        let mut state = self.lock_state();
        state.location_granted = false;
        for (id, region) in state.regions.drain() {
            tracing::debug!(geofence_id = %id, "virtual provider dropping region");
            region.sink.registration_lost(
                id,
                RegistrationFailure::PermissionDenied(Capability::Location),
            );
        }
    }

    /// Drop one region on the provider's own initiative.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::NotFound`] when the region is not monitored.
    pub fn drop_region(&self, id: &GeofenceId, reason: &str) -> Result<(), HushbotError> {
        let region = self
            .lock_state()
            .regions
            .remove(id)
            .ok_or_else(|| not_monitored(id))?;
        region
            .sink
            .registration_lost(id.clone(), RegistrationFailure::Provider(reason.to_string()));
        Ok(())
    }

    /// Report a crossing for a monitored region, regardless of position.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::NotFound`] when the region is not monitored.
    pub fn emit(&self, id: &GeofenceId, kind: TransitionKind) -> Result<(), HushbotError> {
        let mut state = self.lock_state();
        let region = state.regions.get_mut(id).ok_or_else(|| not_monitored(id))?;
        region.inside = kind == TransitionKind::Enter;
        region
            .sink
            .transition(TransitionEvent::from_provider(id.clone(), kind, now()));
        Ok(())
    }

    /// Move the simulated device and report every crossing it causes.
    /// Returns the number of crossings reported.
    pub fn move_to(&self, position: Coordinates) -> usize {
        let mut state = self.lock_state();
        state.position = Some(position);
        let observed_at = now();

        let mut reported = 0;
        for (id, region) in &mut state.regions {
            let inside = region.geofence.contains(&position);
            if inside == region.inside {
                continue;
            }
            region.inside = inside;
            let kind = if inside {
                TransitionKind::Enter
            } else {
                TransitionKind::Exit
            };
            region
                .sink
                .transition(TransitionEvent::from_provider(id.clone(), kind, observed_at));
            reported += 1;
        }
        reported
    }

    #[must_use]
    pub fn is_monitoring(&self, id: &GeofenceId) -> bool {
        self.lock_state().regions.contains_key(id)
    }

    /// Ids of the monitored regions, sorted.
    #[must_use]
    pub fn monitored_ids(&self) -> Vec<GeofenceId> {
        let mut ids: Vec<GeofenceId> = self.lock_state().regions.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    fn add(&self, geofence: Geofence, sink: TransitionSink) -> Result<(), HushbotError> {
        let mut state = self.lock_state();
        if !state.location_granted {
            return Err(PermissionDenied {
                capability: Capability::Location,
            }
            .into());
        }
        if !state.regions.contains_key(&geofence.id) && state.regions.len() >= state.max_regions {
            return Err(ProviderError::TooManyRegions.into());
        }

        // a region added while the device is already inside reports nothing
        // until it leaves
        let inside = state
            .position
            .is_some_and(|position| geofence.contains(&position));
        tracing::debug!(geofence_id = %geofence.id, inside, "virtual provider monitoring region");
        state.regions.insert(
            geofence.id.clone(),
            Region {
                geofence,
                sink,
                inside,
            },
        );
        Ok(())
    }

    fn remove(&self, id: &GeofenceId) -> Result<(), HushbotError> {
        self.lock_state()
            .regions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::RegionNotFound.into())
    }

    fn lock_state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GeofencingProvider for VirtualGeofencingProvider {
    fn add_region(
        &self,
        geofence: Geofence,
        sink: TransitionSink,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        let result = self.add(geofence, sink);
        async { result }
    }

    fn remove_region(
        &self,
        id: GeofenceId,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        let result = self.remove(&id);
        async { result }
    }
}

fn not_monitored(id: &GeofenceId) -> HushbotError {
    NotFoundError {
        entity: "Region",
        id: id.to_string(),
    }
    .into()
}
