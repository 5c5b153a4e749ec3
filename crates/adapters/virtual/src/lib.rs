//! # hushbot-adapter-virtual
//!
//! Virtual/demo adapters that stand in for the device's OS services, for
//! testing and demonstration purposes.
//!
//! ## Provided adapters
//!
//! | Adapter | Port | Behaviour |
//! |---------|------|-----------|
//! | [`VirtualGeofencingProvider`] | `GeofencingProvider` | Monitors regions against a simulated position; permission and region limit can be toggled |
//! | [`VirtualLocationProvider`] | `LocationProvider` | Returns the last position it was given |
//! | [`VirtualPolicyController`] | `NotificationPolicyController` | In-memory DND filter with a revocable write capability |
//!
//! [`VirtualDevice`] bundles the three behind shared handles.
//!
//! ## Dependency rule
//!
//! Depends on `hushbot-app` (port traits) and `hushbot-domain` only.

mod geofencing;
mod location;
mod policy;

use std::sync::Arc;

use hushbot_domain::geo::Coordinates;

pub use geofencing::{DEFAULT_MAX_REGIONS, VirtualGeofencingProvider};
pub use location::VirtualLocationProvider;
pub use policy::VirtualPolicyController;

/// A simulated phone: one geofencing provider, location fix and DND filter.
#[derive(Clone, Default)]
pub struct VirtualDevice {
    pub geofencing: Arc<VirtualGeofencingProvider>,
    pub location: Arc<VirtualLocationProvider>,
    pub policy: Arc<VirtualPolicyController>,
}

impl VirtualDevice {
    /// Move the device: updates the last known fix and lets the geofencing
    /// provider report any crossings. Returns the number of crossings.
    pub fn walk_to(&self, position: Coordinates) -> usize {
        self.location.set_position(Some(position));
        self.geofencing.move_to(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hushbot_app::ports::{GeofencingProvider, LocationProvider};
    use hushbot_app::transition_channel::{self, ProviderSignal};
    use hushbot_domain::geofence::Geofence;
    use hushbot_domain::transition::{TransitionKind, TransitionSource};

    #[tokio::test]
    async fn should_update_fix_and_report_crossing_when_walking() {
        let device = VirtualDevice::default();
        let (sink, mut queue) = transition_channel::channel();
        let office = Geofence::builder()
            .name("Office")
            .center(48.85, 2.35)
            .radius_meters(100.0)
            .build()
            .unwrap();
        device.geofencing.add_region(office, sink).await.unwrap();

        let crossings = device.walk_to(Coordinates {
            latitude: 48.85,
            longitude: 2.35,
        });

        assert_eq!(crossings, 1);
        assert!(device.location.last_known_position().await.unwrap().is_some());
        match queue.try_recv() {
            Some(ProviderSignal::Transition(event)) => {
                assert_eq!(event.kind, TransitionKind::Enter);
                assert_eq!(event.source, TransitionSource::Provider);
                assert_eq!(event.geofence_id.as_str(), "office");
            }
            other => panic!("expected a transition, got {other:?}"),
        }
    }

    #[test]
    fn should_share_adapters_between_clones() {
        let device = VirtualDevice::default();
        let clone = device.clone();
        clone.policy.set_enabled_externally(true);
        assert!(device.policy.is_enabled());
    }
}
