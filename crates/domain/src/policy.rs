//! Policy state: the device-wide do-not-disturb setting as the engine sees it.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::{Capability, HushbotError};
use crate::id::GeofenceId;

/// Process-wide DND state.
///
/// Only the transition processor writes it; everyone else reads snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyState {
    pub dnd_enabled: bool,
    pub last_applied_by: Option<GeofenceId>,
    pub last_applied_at: Option<Timestamp>,
}

impl PolicyState {
    /// Initial state, seeded from the policy controller at startup.
    #[must_use]
    pub fn initial(dnd_enabled: bool) -> Self {
        Self {
            dnd_enabled,
            ..Self::default()
        }
    }

    /// Record a successful write made on behalf of `geofence_id`.
    pub fn record_write(&mut self, dnd_enabled: bool, geofence_id: GeofenceId, at: Timestamp) {
        self.dnd_enabled = dnd_enabled;
        self.last_applied_by = Some(geofence_id);
        self.last_applied_at = Some(at);
    }
}

/// Why a policy write was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PolicyFailure {
    PermissionDenied,
    Unavailable(String),
}

impl From<&HushbotError> for PolicyFailure {
    fn from(err: &HushbotError) -> Self {
        match err {
            HushbotError::PermissionDenied(denied)
                if denied.capability == Capability::NotificationPolicy =>
            {
                Self::PermissionDenied
            }
            HushbotError::PolicyUnavailable(reason) => Self::Unavailable(reason.clone()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// What the UI shows about the policy: the state, whether it may be written,
/// and the most recent write failure (cleared on the next successful write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub state: PolicyState,
    pub has_capability: bool,
    pub last_failure: Option<PolicyFailure>,
}
