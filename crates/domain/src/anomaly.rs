//! Anomalies: non-fatal irregularities, logged and counted but never
//! surfaced as failures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::id::GeofenceId;
use crate::registration::RegistrationState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anomaly {
    /// A transition referenced a geofence missing from the registry.
    UnknownGeofence { geofence_id: GeofenceId },
    /// A transition referenced a geofence that is not active.
    InactiveGeofence {
        geofence_id: GeofenceId,
        state: RegistrationState,
    },
    /// A transition was observed before the newest one already accepted.
    /// It is still applied.
    OutOfOrder {
        geofence_id: GeofenceId,
        observed_at: Timestamp,
        newest_observed_at: Timestamp,
    },
    /// A provider acknowledgement arrived for a superseded or deleted request.
    StaleAcknowledgement { geofence_id: GeofenceId },
    /// A provider acknowledgement would move a registration along an edge
    /// the lifecycle does not have. The state is left unchanged.
    IllegalRegistrationStep {
        geofence_id: GeofenceId,
        from: RegistrationState,
        to: RegistrationState,
    },
}

impl Anomaly {
    #[must_use]
    pub fn geofence_id(&self) -> &GeofenceId {
        match self {
            Self::UnknownGeofence { geofence_id }
            | Self::InactiveGeofence { geofence_id, .. }
            | Self::OutOfOrder { geofence_id, .. }
            | Self::StaleAcknowledgement { geofence_id }
            | Self::IllegalRegistrationStep { geofence_id, .. } => geofence_id,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGeofence { geofence_id } => {
                write!(f, "transition for unknown geofence {geofence_id}")
            }
            Self::InactiveGeofence { geofence_id, state } => {
                write!(f, "transition for geofence {geofence_id} in state {state}")
            }
            Self::OutOfOrder {
                geofence_id,
                observed_at,
                newest_observed_at,
            } => write!(
                f,
                "transition for {geofence_id} observed at {observed_at} precedes {newest_observed_at}"
            ),
            Self::StaleAcknowledgement { geofence_id } => {
                write!(f, "stale provider acknowledgement for {geofence_id}")
            }
            Self::IllegalRegistrationStep {
                geofence_id,
                from,
                to,
            } => write!(
                f,
                "registration of {geofence_id} cannot move from {from} to {to}"
            ),
        }
    }
}
