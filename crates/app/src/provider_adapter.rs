//! Provider adapter: translates engine requests into geofencing provider
//! calls and keeps per-geofence registration state.
//!
//! Calls for different ids run concurrently. Calls for the same id go through
//! a per-id lane (an async mutex). The engine takes a [`LaneTurn`] before it
//! starts a request and keeps it until the provider has answered, so requests
//! for one id reach the provider in the order their generations were issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use hushbot_domain::anomaly::Anomaly;
use hushbot_domain::error::{HushbotError, ProviderError};
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;
use hushbot_domain::registration::{RegistrationFailure, RegistrationState};

use crate::ports::{GeofencingProvider, LocationProvider};
use crate::transition_channel::TransitionSink;

type Lane = Arc<tokio::sync::Mutex<()>>;
type Lanes = Arc<Mutex<HashMap<GeofenceId, Lane>>>;

/// Exclusive use of one geofence's provider lane, until dropped.
#[derive(Debug)]
pub struct LaneTurn {
    id: GeofenceId,
    guard: Option<OwnedMutexGuard<()>>,
    lanes: Lanes,
}

impl LaneTurn {
    #[must_use]
    pub fn id(&self) -> &GeofenceId {
        &self.id
    }
}

impl Drop for LaneTurn {
    fn drop(&mut self) {
        self.guard.take();
        // forget the lane once nobody holds or waits for it
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        if lanes
            .get(&self.id)
            .is_some_and(|lane| Arc::strong_count(lane) == 1)
        {
            lanes.remove(&self.id);
        }
    }
}

pub struct ProviderAdapter<G, L> {
    geofencing: G,
    location: L,
    sink: TransitionSink,
    lanes: Lanes,
}

impl<G, L> ProviderAdapter<G, L>
where
    G: GeofencingProvider,
    L: LocationProvider,
{
    pub fn new(geofencing: G, location: L, sink: TransitionSink) -> Self {
        Self {
            geofencing,
            location,
            sink,
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The sink regions report into.
    #[must_use]
    pub fn sink(&self) -> &TransitionSink {
        &self.sink
    }

    /// Wait for the lane of `id`. Turns are handed out in request order.
    pub async fn lane_for(&self, id: &GeofenceId) -> LaneTurn {
        let lane = self.lane(id);
        LaneTurn {
            id: id.clone(),
            guard: Some(lane.lock_owned().await),
            lanes: Arc::clone(&self.lanes),
        }
    }

    /// Ask the provider to start monitoring the geofence `turn` is for.
    ///
    /// # Errors
    ///
    /// Returns the [`RegistrationFailure`] to record when the provider refuses
    /// (missing location permission, provider failure).
    pub async fn register(
        &self,
        turn: &LaneTurn,
        geofence: Geofence,
    ) -> Result<(), RegistrationFailure> {
        debug_assert_eq!(turn.id(), &geofence.id);
        self.geofencing
            .add_region(geofence, self.sink.clone())
            .await
            .map_err(|err| {
                tracing::warn!(%err, geofence_id = %turn.id(), "geofence registration failed");
                RegistrationFailure::from(err)
            })
    }

    /// Ask the provider to stop monitoring the geofence `turn` is for. A
    /// provider that does not know the id counts as success.
    ///
    /// # Errors
    ///
    /// Returns the [`RegistrationFailure`] to record for any other failure.
    pub async fn deregister(&self, turn: &LaneTurn) -> Result<(), RegistrationFailure> {
        let id = turn.id();
        match self.geofencing.remove_region(id.clone()).await {
            Ok(()) => Ok(()),
            Err(HushbotError::Provider(ProviderError::RegionNotFound)) => {
                tracing::debug!(geofence_id = %id, "provider did not know region, treating as removed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, geofence_id = %id, "geofence deregistration failed");
                Err(RegistrationFailure::from(err))
            }
        }
    }

    /// The device's last known position.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::LocationUnavailable`] when no fix is known, or
    /// propagates provider failures.
    pub async fn current_position(&self) -> Result<Coordinates, HushbotError> {
        self.location
            .last_known_position()
            .await?
            .ok_or(HushbotError::LocationUnavailable)
    }

    fn lane(&self, id: &GeofenceId) -> Lane {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(id.clone()).or_default())
    }
}

/// A registration state tagged with the request that produced it.
#[derive(Debug, Clone)]
struct Registration {
    state: RegistrationState,
    generation: u64,
}

/// Per-geofence registration states.
///
/// Each request (register, deregister) bumps a generation counter; a provider
/// acknowledgement only lands if its generation is still current, so late
/// answers to superseded requests are dropped instead of resurrecting state.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    entries: HashMap<GeofenceId, Registration>,
    next_generation: u64,
}

impl RegistrationTable {
    /// Current state; unknown ids are `Unregistered`.
    #[must_use]
    pub fn state(&self, id: &GeofenceId) -> RegistrationState {
        self.entries
            .get(id)
            .map(|r| r.state.clone())
            .unwrap_or_default()
    }

    /// Start a new request for `id`, moving it to `state`. Returns the
    /// request's generation.
    pub fn begin(&mut self, id: &GeofenceId, state: RegistrationState) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            id.clone(),
            Registration { state, generation },
        );
        generation
    }

    /// Land the answer to request `generation`.
    ///
    /// # Errors
    ///
    /// Returns the [`Anomaly`] to record, and changes nothing, when the
    /// request was superseded, the entry is gone, or the lifecycle has no
    /// edge to `state`.
    pub fn resolve(
        &mut self,
        id: &GeofenceId,
        generation: u64,
        state: RegistrationState,
    ) -> Result<(), Anomaly> {
        let entry = self.current_mut(id, generation)?;
        step(id, &entry.state, &state)?;
        entry.state = state;
        Ok(())
    }

    /// Drop the entry once the provider acknowledged request `generation`
    /// to stop monitoring.
    ///
    /// # Errors
    ///
    /// Same as [`RegistrationTable::resolve`].
    pub fn finish_removal(&mut self, id: &GeofenceId, generation: u64) -> Result<(), Anomaly> {
        let entry = self.current_mut(id, generation)?;
        step(id, &entry.state, &RegistrationState::Unregistered)?;
        self.entries.remove(id);
        Ok(())
    }

    /// Move an active registration to `Error`, as reported by the provider.
    /// Returns `false` when the geofence was not active.
    pub fn fail_active(&mut self, id: &GeofenceId, failure: RegistrationFailure) -> bool {
        let failed = RegistrationState::Error(failure);
        match self.entries.get_mut(id) {
            Some(entry) if entry.state.is_active() && entry.state.can_transition_to(&failed) => {
                entry.state = failed;
                true
            }
            _ => false,
        }
    }

    fn current_mut(&mut self, id: &GeofenceId, generation: u64) -> Result<&mut Registration, Anomaly> {
        match self.entries.get_mut(id) {
            Some(entry) if entry.generation == generation => Ok(entry),
            _ => Err(Anomaly::StaleAcknowledgement {
                geofence_id: id.clone(),
            }),
        }
    }

    pub fn forget(&mut self, id: &GeofenceId) {
        self.entries.remove(id);
    }
}

fn step(id: &GeofenceId, from: &RegistrationState, to: &RegistrationState) -> Result<(), Anomaly> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Anomaly::IllegalRegistrationStep {
            geofence_id: id.clone(),
            from: from.clone(),
            to: to.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGeofencing, FakeLocation, geofence, id};
    use crate::transition_channel;
    use hushbot_domain::error::Capability;
    use std::sync::atomic::Ordering;

    type TestAdapter = ProviderAdapter<Arc<FakeGeofencing>, Arc<FakeLocation>>;

    fn adapter() -> (Arc<FakeGeofencing>, Arc<FakeLocation>, TestAdapter) {
        let geofencing = Arc::new(FakeGeofencing::default());
        let location = Arc::new(FakeLocation::default());
        let (sink, _queue) = transition_channel::channel();
        let adapter = ProviderAdapter::new(Arc::clone(&geofencing), Arc::clone(&location), sink);
        (geofencing, location, adapter)
    }

    async fn register(adapter: &TestAdapter, geofence: Geofence) -> Result<(), RegistrationFailure> {
        let turn = adapter.lane_for(&geofence.id).await;
        let result = adapter.register(&turn, geofence).await;
        drop(turn);
        result
    }

    async fn deregister(adapter: &TestAdapter, id: &GeofenceId) -> Result<(), RegistrationFailure> {
        let turn = adapter.lane_for(id).await;
        let result = adapter.deregister(&turn).await;
        drop(turn);
        result
    }

    #[tokio::test]
    async fn should_register_region_with_provider() {
        let (geofencing, _, adapter) = adapter();
        register(&adapter, geofence("Home", 37.0, -122.0, 50.0))
            .await
            .unwrap();
        assert!(geofencing.is_registered("home"));
    }

    #[tokio::test]
    async fn should_map_missing_location_permission_to_failure() {
        let (geofencing, _, adapter) = adapter();
        geofencing.location_granted.store(false, Ordering::SeqCst);

        let result = register(&adapter, geofence("Home", 37.0, -122.0, 50.0)).await;

        assert_eq!(
            result,
            Err(RegistrationFailure::PermissionDenied(Capability::Location))
        );
    }

    #[tokio::test]
    async fn should_treat_unknown_region_as_removed() {
        let (_, _, adapter) = adapter();
        assert!(deregister(&adapter, &id("ghost")).await.is_ok());
    }

    #[tokio::test]
    async fn should_keep_register_then_deregister_order_for_same_id() {
        let (geofencing, _, adapter) = adapter();
        let home = geofence("Home", 37.0, -122.0, 50.0);
        let home_id = id("home");

        let (registered, deregistered) = tokio::join!(
            register(&adapter, home),
            deregister(&adapter, &home_id)
        );

        assert!(registered.is_ok());
        assert!(deregistered.is_ok());
        assert_eq!(geofencing.calls(), ["add:home", "remove:home"]);
        assert!(!geofencing.is_registered("home"));
    }

    #[tokio::test]
    async fn should_hold_lane_until_turn_is_released() {
        let (geofencing, _, adapter) = adapter();
        let home_id = id("home");
        let first = adapter.lane_for(&home_id).await;

        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            adapter.lane_for(&home_id),
        )
        .await;
        assert!(waiting.is_err());

        drop(first);
        let second = adapter.lane_for(&home_id).await;
        adapter.deregister(&second).await.unwrap();
        drop(second);
        assert_eq!(geofencing.calls(), ["remove:home"]);
    }

    #[tokio::test]
    async fn should_release_lane_after_last_turn() {
        let (_, _, adapter) = adapter();
        register(&adapter, geofence("Home", 37.0, -122.0, 50.0))
            .await
            .unwrap();
        deregister(&adapter, &id("home")).await.unwrap();
        assert!(adapter.lanes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_return_location_unavailable_without_fix() {
        let (_, location, adapter) = adapter();
        assert!(matches!(
            adapter.current_position().await,
            Err(HushbotError::LocationUnavailable)
        ));

        *location.position.lock().unwrap() = Some(Coordinates {
            latitude: 1.0,
            longitude: 2.0,
        });
        let position = adapter.current_position().await.unwrap();
        assert!((position.latitude - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_drop_resolution_of_superseded_request() {
        let mut table = RegistrationTable::default();
        let home = id("home");
        let first = table.begin(&home, RegistrationState::Pending);
        let second = table.begin(&home, RegistrationState::Pending);

        assert_eq!(
            table.resolve(&home, first, RegistrationState::Active),
            Err(Anomaly::StaleAcknowledgement {
                geofence_id: home.clone()
            })
        );
        assert_eq!(table.state(&home), RegistrationState::Pending);
        assert!(table.resolve(&home, second, RegistrationState::Active).is_ok());
        assert_eq!(table.state(&home), RegistrationState::Active);
    }

    #[test]
    fn should_not_resurrect_forgotten_entry() {
        let mut table = RegistrationTable::default();
        let home = id("home");
        let generation = table.begin(&home, RegistrationState::Pending);
        table.forget(&home);

        assert!(table.resolve(&home, generation, RegistrationState::Active).is_err());
        assert_eq!(table.state(&home), RegistrationState::Unregistered);
    }

    #[test]
    fn should_reject_step_missing_from_lifecycle() {
        let mut table = RegistrationTable::default();
        let home = id("home");
        let generation = table.begin(&home, RegistrationState::Removing);

        assert_eq!(
            table.resolve(&home, generation, RegistrationState::Active),
            Err(Anomaly::IllegalRegistrationStep {
                geofence_id: home.clone(),
                from: RegistrationState::Removing,
                to: RegistrationState::Active,
            })
        );
        assert_eq!(table.state(&home), RegistrationState::Removing);
    }

    #[test]
    fn should_only_finish_removal_of_removing_entry() {
        let mut table = RegistrationTable::default();
        let home = id("home");
        let pending = table.begin(&home, RegistrationState::Pending);

        assert!(matches!(
            table.finish_removal(&home, pending),
            Err(Anomaly::IllegalRegistrationStep { .. })
        ));
        assert_eq!(table.state(&home), RegistrationState::Pending);

        let removing = table.begin(&home, RegistrationState::Removing);
        assert!(table.finish_removal(&home, removing).is_ok());
        assert_eq!(table.state(&home), RegistrationState::Unregistered);
    }

    #[test]
    fn should_only_fail_active_registrations() {
        let mut table = RegistrationTable::default();
        let home = id("home");
        let generation = table.begin(&home, RegistrationState::Pending);
        let failure = RegistrationFailure::Provider("location off".to_string());

        assert!(!table.fail_active(&home, failure.clone()));
        table
            .resolve(&home, generation, RegistrationState::Active)
            .unwrap();
        assert!(table.fail_active(&home, failure.clone()));
        assert_eq!(table.state(&home), RegistrationState::Error(failure));
    }
}
