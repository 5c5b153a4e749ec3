//! Automation engine: owns the geofence registry and drives the DND policy
//! from provider transitions.
//!
//! Three asynchronous sources meet here: user edits, provider registration
//! acknowledgements, and transition signals. All of them mutate one
//! [`EngineState`] behind a single async lock, so a geofence can never be
//! edited or deleted while a transition for it is being applied. Provider
//! calls themselves run outside the lock; their answers are tagged with a
//! request generation and dropped if superseded.
//!
//! Every state change is also published as an [`Event`] so a UI can render
//! snapshots without sharing mutable state.

use std::sync::Arc;

use tokio::sync::Mutex;

use hushbot_domain::anomaly::Anomaly;
use hushbot_domain::clock::{Clock, SystemClock};
use hushbot_domain::error::{HushbotError, NotFoundError};
use hushbot_domain::event::Event;
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::{Geofence, GeofenceDraft};
use hushbot_domain::id::GeofenceId;
use hushbot_domain::policy::{PolicyState, PolicyStatus};
use hushbot_domain::registration::{GeofenceStatus, RegistrationFailure, RegistrationState};
use hushbot_domain::transition::TransitionEvent;

use crate::mock_harness::MockLocationHarness;
use crate::policy_adapter::PolicyControllerAdapter;
use crate::ports::{EventPublisher, GeofencingProvider, LocationProvider, NotificationPolicyController};
use crate::provider_adapter::{LaneTurn, ProviderAdapter, RegistrationTable};
use crate::registry::GeofenceRegistry;
use crate::transition_channel::{ProviderSignal, TransitionQueue, TransitionSink};
use crate::transition_processor::{TransitionContext, TransitionOutcome, TransitionProcessor};

/// Everything guarded by the engine lock.
#[derive(Debug)]
struct EngineState {
    registry: GeofenceRegistry,
    registrations: RegistrationTable,
    processor: TransitionProcessor,
    harness: MockLocationHarness,
    anomalies: u64,
}

impl EngineState {
    fn record_anomaly(&mut self, anomaly: &Anomaly) -> Event {
        self.anomalies += 1;
        tracing::warn!(%anomaly, total = self.anomalies, "anomaly");
        Event::anomaly_detected(anomaly)
    }
}

/// The geofence-to-policy automation engine.
///
/// Construct it with [`AutomationEngine::start`], feed it provider signals
/// with [`AutomationEngine::run`] (or [`AutomationEngine::process_pending`]
/// in tests), and drive it from the UI with the command and query methods.
pub struct AutomationEngine<G, L, P, E> {
    provider: ProviderAdapter<G, L>,
    policy: PolicyControllerAdapter<P>,
    publisher: E,
    clock: Arc<dyn Clock>,
    state: Mutex<EngineState>,
}

impl<G, L, P, E> AutomationEngine<G, L, P, E>
where
    G: GeofencingProvider,
    L: LocationProvider,
    P: NotificationPolicyController,
    E: EventPublisher,
{
    /// Start an engine with an empty registry and the DND state read from
    /// the policy controller. Regions registered by this engine report into
    /// `sink`.
    pub async fn start(
        geofencing: G,
        location: L,
        policy: P,
        publisher: E,
        sink: TransitionSink,
    ) -> Self {
        Self::start_with_clock(
            geofencing,
            location,
            policy,
            publisher,
            sink,
            Arc::new(SystemClock),
        )
        .await
    }

    /// Like [`AutomationEngine::start`], with an explicit clock.
    pub async fn start_with_clock(
        geofencing: G,
        location: L,
        policy: P,
        publisher: E,
        sink: TransitionSink,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = PolicyControllerAdapter::new(policy);
        let dnd_enabled = match policy.current_dnd_state().await {
            Ok(enabled) => enabled,
            Err(err) => {
                tracing::warn!(%err, "could not read DND state at startup, assuming off");
                false
            }
        };
        tracing::info!(dnd_enabled, "automation engine started");

        Self {
            provider: ProviderAdapter::new(geofencing, location, sink),
            policy,
            publisher,
            clock,
            state: Mutex::new(EngineState {
                registry: GeofenceRegistry::new(),
                registrations: RegistrationTable::default(),
                processor: TransitionProcessor::new(dnd_enabled),
                harness: MockLocationHarness::default(),
                anomalies: 0,
            }),
        }
    }

    /// A sink feeding this engine's queue, for providers that deliver
    /// transitions out of band.
    #[must_use]
    pub fn transition_sink(&self) -> TransitionSink {
        self.provider.sink().clone()
    }

    // ── Geofence commands ──────────────────────────────────────

    /// Save a geofence (inserting it, or replacing the one with the same id)
    /// and register it with the provider.
    ///
    /// Provider failures do not fail the call: they are recorded in, and
    /// returned as, the geofence's [`RegistrationState`].
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::Validation`] for an invalid definition; the
    /// provider is not contacted.
    #[tracing::instrument(skip(self, geofence), fields(geofence_id = %geofence.id))]
    pub async fn add_or_update_geofence(
        &self,
        geofence: Geofence,
    ) -> Result<RegistrationState, HushbotError> {
        let turn = self.provider.lane_for(&geofence.id).await;
        let generation = {
            let mut state = self.state.lock().await;
            let id = state.registry.add(geofence.clone())?;
            state.harness.forget(&id);
            state.registrations.begin(&id, RegistrationState::Pending)
        };
        self.publish_saved(&geofence.id).await;
        Ok(self.register(turn, geofence, generation).await)
    }

    /// Replace the definition stored under `id` and re-register it. The id is
    /// kept even if the name changes.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::Validation`] for an invalid definition or
    /// [`HushbotError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self, geofence))]
    pub async fn update_geofence(
        &self,
        id: &GeofenceId,
        geofence: Geofence,
    ) -> Result<RegistrationState, HushbotError> {
        let turn = self.provider.lane_for(id).await;
        let (stored, generation) = {
            let mut state = self.state.lock().await;
            state.registry.update(id, geofence)?;
            let stored = state
                .registry
                .get(id)
                .cloned()
                .ok_or_else(|| not_found(id))?;
            state.harness.forget(id);
            let generation = state.registrations.begin(id, RegistrationState::Pending);
            (stored, generation)
        };
        self.publish_saved(id).await;
        Ok(self.register(turn, stored, generation).await)
    }

    /// Parse form input and save it. A draft opened with
    /// [`AutomationEngine::edit_draft`] replaces the geofence it was opened
    /// from, even when the name changed.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::Validation`] when the draft does not parse or
    /// validate, or [`HushbotError::NotFound`] when the edited geofence was
    /// deleted meanwhile.
    pub async fn save_draft(&self, draft: &GeofenceDraft) -> Result<RegistrationState, HushbotError> {
        let geofence = draft.parse()?;
        match &draft.editing {
            Some(id) => self.update_geofence(id, geofence).await,
            None => self.add_or_update_geofence(geofence).await,
        }
    }

    /// Register the stored definition again, e.g. once a missing permission
    /// has been granted.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn retry_registration(
        &self,
        id: &GeofenceId,
    ) -> Result<RegistrationState, HushbotError> {
        let turn = self.provider.lane_for(id).await;
        let (geofence, generation) = {
            let mut state = self.state.lock().await;
            let geofence = state
                .registry
                .get(id)
                .cloned()
                .ok_or_else(|| not_found(id))?;
            state.harness.forget(id);
            let generation = state.registrations.begin(id, RegistrationState::Pending);
            (geofence, generation)
        };
        self.publish(Event::registration_changed(
            id.clone(),
            &RegistrationState::Pending,
        ))
        .await;
        Ok(self.register(turn, geofence, generation).await)
    }

    /// Deregister a geofence, then remove it once the provider acknowledges.
    ///
    /// Deleting an unknown id succeeds. While removal is in flight the
    /// geofence is `Removing` and its transitions are dropped.
    ///
    /// # Errors
    ///
    /// Returns the provider failure when deregistration fails; the geofence
    /// is kept in `Error` so the user can retry.
    #[tracing::instrument(skip(self))]
    pub async fn delete_geofence(&self, id: &GeofenceId) -> Result<(), HushbotError> {
        let turn = self.provider.lane_for(id).await;
        let generation = {
            let mut state = self.state.lock().await;
            if !state.registry.contains(id) {
                tracing::debug!("geofence already absent");
                return Ok(());
            }
            state.harness.forget(id);
            state.registrations.begin(id, RegistrationState::Removing)
        };
        self.publish(Event::registration_changed(
            id.clone(),
            &RegistrationState::Removing,
        ))
        .await;

        let result = self.provider.deregister(&turn).await;

        let mut state = self.state.lock().await;
        let settled = match &result {
            Ok(()) => state.registrations.finish_removal(id, generation),
            Err(failure) => state.registrations.resolve(
                id,
                generation,
                RegistrationState::Error(failure.clone()),
            ),
        };
        if let Err(anomaly) = settled {
            let event = state.record_anomaly(&anomaly);
            drop(state);
            drop(turn);
            self.publish(event).await;
            return Ok(());
        }

        if result.is_ok() {
            state.registry.remove(id);
        }
        drop(state);
        drop(turn);

        match result {
            Ok(()) => {
                tracing::info!("geofence removed");
                self.publish(Event::geofence_removed(id.clone())).await;
                Ok(())
            }
            Err(failure) => {
                self.publish(Event::registration_changed(
                    id.clone(),
                    &RegistrationState::Error(failure.clone()),
                ))
                .await;
                Err(failure.into())
            }
        }
    }

    async fn register(
        &self,
        turn: LaneTurn,
        geofence: Geofence,
        generation: u64,
    ) -> RegistrationState {
        let id = geofence.id.clone();
        let next = match self.provider.register(&turn, geofence).await {
            Ok(()) => RegistrationState::Active,
            Err(failure) => RegistrationState::Error(failure),
        };

        let (current, event) = {
            let mut state = self.state.lock().await;
            let event = match state.registrations.resolve(&id, generation, next.clone()) {
                Ok(()) => {
                    tracing::info!(geofence_id = %id, registration = %next, "registration settled");
                    Event::registration_changed(id.clone(), &next)
                }
                Err(anomaly) => state.record_anomaly(&anomaly),
            };
            (state.registrations.state(&id), event)
        };
        drop(turn);
        self.publish(event).await;
        current
    }

    // ── Provider signals ───────────────────────────────────────

    /// Consume provider signals until every sink is dropped.
    pub async fn run(&self, mut queue: TransitionQueue) {
        while let Some(signal) = queue.recv().await {
            self.process_signal(signal).await;
        }
        tracing::info!("transition queue closed");
    }

    /// Process every signal already queued, returning the transition
    /// outcomes in order.
    pub async fn process_pending(&self, queue: &mut TransitionQueue) -> Vec<TransitionOutcome> {
        let mut outcomes = Vec::new();
        while let Some(signal) = queue.try_recv() {
            if let Some(outcome) = self.process_signal(signal).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Process one provider signal. Returns the outcome for transitions.
    pub async fn process_signal(&self, signal: ProviderSignal) -> Option<TransitionOutcome> {
        match signal {
            ProviderSignal::Transition(event) => Some(self.process_transition(event).await),
            ProviderSignal::RegistrationLost {
                geofence_id,
                failure,
            } => {
                self.registration_lost(geofence_id, failure).await;
                None
            }
        }
    }

    /// Apply one transition under the engine lock.
    #[tracing::instrument(skip(self, event), fields(geofence_id = %event.geofence_id, kind = %event.kind))]
    pub async fn process_transition(&self, event: TransitionEvent) -> TransitionOutcome {
        let now = self.clock.now();
        let mut events = Vec::new();

        let outcome = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let registration = state.registrations.state(&event.geofence_id);
            let ctx = TransitionContext {
                geofence: state.registry.get(&event.geofence_id),
                registration: &registration,
                mock_override: state.harness.is_enabled(),
            };
            let processed = state
                .processor
                .process(&event, ctx, &self.policy, now)
                .await;

            for anomaly in &processed.anomalies {
                events.push(state.record_anomaly(anomaly));
            }
            match &processed.outcome {
                TransitionOutcome::Applied { .. } => {
                    events.push(Event::policy_applied(state.processor.policy()));
                }
                TransitionOutcome::Failed(failure) => {
                    events.push(Event::policy_write_failed(
                        event.geofence_id.clone(),
                        failure,
                    ));
                }
                _ => {}
            }
            processed.outcome
        };

        self.publish_all(events).await;
        outcome
    }

    async fn registration_lost(&self, id: GeofenceId, failure: RegistrationFailure) {
        let event = {
            let mut state = self.state.lock().await;
            if state.registrations.fail_active(&id, failure.clone()) {
                state.harness.forget(&id);
                tracing::warn!(geofence_id = %id, %failure, "provider dropped registration");
                Some(Event::registration_changed(
                    id,
                    &RegistrationState::Error(failure),
                ))
            } else {
                tracing::debug!(geofence_id = %id, "registration loss for inactive geofence ignored");
                None
            }
        };
        if let Some(event) = event {
            self.publish(event).await;
        }
    }

    // ── Mock location harness ──────────────────────────────────

    /// Make the mock harness the only transition source.
    pub async fn enable_mock_location(&self) {
        self.state.lock().await.harness.enable();
        tracing::info!("mock location enabled");
    }

    /// Hand control back to the real provider. No final exit is synthesized.
    pub async fn disable_mock_location(&self) {
        self.state.lock().await.harness.disable();
        tracing::info!("mock location disabled");
    }

    pub async fn mock_location_enabled(&self) -> bool {
        self.state.lock().await.harness.is_enabled()
    }

    /// Inject a synthetic position. Crossings of active geofences are queued
    /// like provider transitions and returned. Does nothing while the harness
    /// is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::Validation`] for out-of-range coordinates.
    #[tracing::instrument(skip(self))]
    pub async fn set_mock_position(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<TransitionEvent>, HushbotError> {
        let position = Coordinates::new(latitude, longitude)?;
        let observed_at = self.clock.now();

        let transitions = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if !state.harness.is_enabled() {
                tracing::debug!("mock location disabled, position ignored");
                return Ok(Vec::new());
            }
            let registrations = &state.registrations;
            let active: Vec<&Geofence> = state
                .registry
                .list()
                .iter()
                .filter(|g| registrations.state(&g.id).is_active())
                .collect();
            state.harness.set_position(position, active, observed_at)
        };

        for transition in &transitions {
            if !self.provider.sink().transition(transition.clone()) {
                tracing::warn!("transition queue closed, synthetic transition lost");
            }
        }
        Ok(transitions)
    }

    // ── Queries ────────────────────────────────────────────────

    /// All geofences in insertion order.
    pub async fn list_geofences(&self) -> Vec<Geofence> {
        self.state.lock().await.registry.list().to_vec()
    }

    pub async fn get_geofence(&self, id: &GeofenceId) -> Option<Geofence> {
        self.state.lock().await.registry.get(id).cloned()
    }

    /// Geofences with their registration states, in insertion order.
    pub async fn geofence_statuses(&self) -> Vec<GeofenceStatus> {
        let state = self.state.lock().await;
        state
            .registry
            .list()
            .iter()
            .map(|geofence| GeofenceStatus {
                geofence: geofence.clone(),
                registration: state.registrations.state(&geofence.id),
            })
            .collect()
    }

    pub async fn current_registration_state(&self, id: &GeofenceId) -> RegistrationState {
        self.state.lock().await.registrations.state(id)
    }

    pub async fn current_policy_state(&self) -> PolicyState {
        self.state.lock().await.processor.policy().clone()
    }

    pub async fn policy_status(&self) -> PolicyStatus {
        let has_capability = self.policy.has_capability().await;
        let state = self.state.lock().await;
        PolicyStatus {
            state: state.processor.policy().clone(),
            has_capability,
            last_failure: state.processor.last_failure().cloned(),
        }
    }

    /// Whether DND may be written, so the UI can prompt before any write.
    pub async fn has_policy_capability(&self) -> bool {
        self.policy.has_capability().await
    }

    pub async fn anomaly_count(&self) -> u64 {
        self.state.lock().await.anomalies
    }

    /// The device's last known position.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::LocationUnavailable`] when none is known.
    pub async fn current_position(&self) -> Result<Coordinates, HushbotError> {
        self.provider.current_position().await
    }

    /// A blank draft for a new geofence, centered on the last known position
    /// when there is one.
    pub async fn draft_geofence(&self) -> GeofenceDraft {
        match self.provider.current_position().await {
            Ok(position) => GeofenceDraft::centered_at(Some(position)),
            Err(err) => {
                tracing::debug!(%err, "no position to pre-fill draft");
                GeofenceDraft::centered_at(None)
            }
        }
    }

    /// A draft pre-filled from a stored geofence, for editing.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::NotFound`] for an unknown id.
    pub async fn edit_draft(&self, id: &GeofenceId) -> Result<GeofenceDraft, HushbotError> {
        self.get_geofence(id)
            .await
            .map(|g| GeofenceDraft::from_geofence(&g))
            .ok_or_else(|| not_found(id))
    }

    // ── Publishing ─────────────────────────────────────────────

    async fn publish_saved(&self, id: &GeofenceId) {
        self.publish_all(vec![
            Event::geofence_saved(id.clone()),
            Event::registration_changed(id.clone(), &RegistrationState::Pending),
        ])
        .await;
    }

    async fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            self.publish(event).await;
        }
    }

    async fn publish(&self, event: Event) {
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, "failed to publish engine event");
        }
    }
}

fn not_found(id: &GeofenceId) -> HushbotError {
    NotFoundError {
        entity: "Geofence",
        id: id.to_string(),
    }
    .into()
}
