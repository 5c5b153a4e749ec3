//! Mock location harness: synthesizes transitions from injected positions.
//!
//! While enabled, each injected position is compared against every active
//! geofence using great-circle (haversine) distance; the boundary counts as
//! inside. Containment is tracked per geofence relative to the harness's own
//! previous answer, starting from "outside", so the first position inside a
//! geofence yields `Enter` and the first position outside yields nothing.

use std::collections::HashMap;

use hushbot_domain::clock::Timestamp;
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;
use hushbot_domain::transition::{TransitionEvent, TransitionKind};

#[derive(Debug, Default)]
pub struct MockLocationHarness {
    enabled: bool,
    position: Option<Coordinates>,
    inside: HashMap<GeofenceId, bool>,
}

impl MockLocationHarness {
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop feeding transitions. No final `Exit` is synthesized; containment
    /// memory is cleared so re-enabling starts afresh.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.position = None;
        self.inside.clear();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The last injected position, while enabled.
    #[must_use]
    pub fn position(&self) -> Option<Coordinates> {
        self.position
    }

    /// Inject a position and return the crossings it causes among `active`.
    /// Returns nothing while disabled.
    pub fn set_position<'a>(
        &mut self,
        position: Coordinates,
        active: impl IntoIterator<Item = &'a Geofence>,
        observed_at: Timestamp,
    ) -> Vec<TransitionEvent> {
        if !self.enabled {
            return Vec::new();
        }
        self.position = Some(position);

        let mut events = Vec::new();
        for geofence in active {
            let now_inside = geofence.contains(&position);
            let was_inside = self
                .inside
                .insert(geofence.id.clone(), now_inside)
                .unwrap_or(false);

            let kind = match (was_inside, now_inside) {
                (false, true) => TransitionKind::Enter,
                (true, false) => TransitionKind::Exit,
                _ => continue,
            };
            tracing::debug!(geofence_id = %geofence.id, %kind, "mock harness synthesized transition");
            events.push(TransitionEvent::from_mock(
                geofence.id.clone(),
                kind,
                observed_at,
            ));
        }
        events
    }

    /// Drop containment memory for a geofence whose definition or
    /// registration changed.
    pub fn forget(&mut self, id: &GeofenceId) {
        self.inside.remove(id);
    }
}
