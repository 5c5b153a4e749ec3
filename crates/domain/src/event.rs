//! Event: an immutable record of something the engine did.
//!
//! Events are published on the in-process bus whenever a geofence is saved or
//! removed, a registration changes state, the policy is written (or fails to
//! be), or an anomaly is detected. Subscribers render snapshots from them.

use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::clock::{Timestamp, now};
use crate::id::{EventId, GeofenceId};
use crate::policy::{PolicyFailure, PolicyState};
use crate::registration::RegistrationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    GeofenceSaved,
    GeofenceRemoved,
    RegistrationChanged,
    PolicyApplied,
    PolicyWriteFailed,
    AnomalyDetected,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GeofenceSaved => "geofence_saved",
            Self::GeofenceRemoved => "geofence_removed",
            Self::RegistrationChanged => "registration_changed",
            Self::PolicyApplied => "policy_applied",
            Self::PolicyWriteFailed => "policy_write_failed",
            Self::AnomalyDetected => "anomaly_detected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub geofence_id: Option<GeofenceId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(
        event_type: EventType,
        geofence_id: Option<GeofenceId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            geofence_id,
            data,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn geofence_saved(geofence_id: GeofenceId) -> Self {
        Self::new(
            EventType::GeofenceSaved,
            Some(geofence_id),
            serde_json::Value::Null,
        )
    }

    #[must_use]
    pub fn geofence_removed(geofence_id: GeofenceId) -> Self {
        Self::new(
            EventType::GeofenceRemoved,
            Some(geofence_id),
            serde_json::Value::Null,
        )
    }

    #[must_use]
    pub fn registration_changed(geofence_id: GeofenceId, state: &RegistrationState) -> Self {
        Self::new(
            EventType::RegistrationChanged,
            Some(geofence_id),
            serde_json::to_value(state).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn policy_applied(state: &PolicyState) -> Self {
        Self::new(
            EventType::PolicyApplied,
            state.last_applied_by.clone(),
            serde_json::to_value(state).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn policy_write_failed(geofence_id: GeofenceId, failure: &PolicyFailure) -> Self {
        Self::new(
            EventType::PolicyWriteFailed,
            Some(geofence_id),
            serde_json::to_value(failure).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn anomaly_detected(anomaly: &Anomaly) -> Self {
        Self::new(
            EventType::AnomalyDetected,
            Some(anomaly.geofence_id().clone()),
            serde_json::to_value(anomaly).unwrap_or_default(),
        )
    }
}
