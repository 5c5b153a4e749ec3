//! Registration state: where a geofence stands with the geofencing provider.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Capability, HushbotError, PermissionDenied, ProviderError};
use crate::geofence::Geofence;

/// Why a registration ended up in [`RegistrationState::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RegistrationFailure {
    /// A capability (location, usually) is not granted.
    PermissionDenied(Capability),
    /// The provider failed for an internal reason.
    Provider(String),
}

impl From<HushbotError> for RegistrationFailure {
    fn from(err: HushbotError) -> Self {
        match err {
            HushbotError::PermissionDenied(denied) => Self::PermissionDenied(denied.capability),
            HushbotError::Provider(err) => Self::from(err),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<ProviderError> for RegistrationFailure {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Internal(reason) => Self::Provider(reason),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<RegistrationFailure> for HushbotError {
    fn from(failure: RegistrationFailure) -> Self {
        match failure {
            RegistrationFailure::PermissionDenied(capability) => {
                PermissionDenied { capability }.into()
            }
            RegistrationFailure::Provider(reason) => ProviderError::Internal(reason).into(),
        }
    }
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied(capability) => write!(f, "permission denied ({capability})"),
            Self::Provider(reason) => write!(f, "provider error: {reason}"),
        }
    }
}

/// Lifecycle of a geofence's registration with the provider.
///
/// ```text
/// Unregistered -> Pending -> Active -> Removing -> (gone)
///                    |          |
///                    +-> Error <+      Error -> Pending on retry
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    Unregistered,
    Pending,
    Active,
    Removing,
    Error(RegistrationFailure),
}

impl RegistrationState {
    /// Only active geofences accept transitions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        use RegistrationState::{Active, Error, Pending, Removing, Unregistered};
        matches!(
            (self, next),
            (_, Pending | Removing)
                | (Pending, Active)
                | (Pending | Active | Removing, Error(_))
                | (Removing, Unregistered)
        )
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => f.write_str("unregistered"),
            Self::Pending => f.write_str("pending"),
            Self::Active => f.write_str("active"),
            Self::Removing => f.write_str("removing"),
            Self::Error(failure) => write!(f, "error: {failure}"),
        }
    }
}

/// A geofence paired with its registration state, as listed to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceStatus {
    pub geofence: Geofence,
    pub registration: RegistrationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_unregistered() {
        assert_eq!(RegistrationState::default(), RegistrationState::Unregistered);
    }

    #[test]
    fn should_only_report_active_as_active() {
        assert!(RegistrationState::Active.is_active());
        assert!(!RegistrationState::Pending.is_active());
        assert!(!RegistrationState::Removing.is_active());
    }

    #[test]
    fn should_allow_retry_from_error_to_pending() {
        let failed = RegistrationState::Error(RegistrationFailure::PermissionDenied(
            Capability::Location,
        ));
        assert!(failed.can_transition_to(&RegistrationState::Pending));
    }

    #[test]
    fn should_not_allow_unregistered_straight_to_active() {
        assert!(!RegistrationState::Unregistered.can_transition_to(&RegistrationState::Active));
    }

    #[test]
    fn should_not_allow_removing_back_to_active() {
        assert!(!RegistrationState::Removing.can_transition_to(&RegistrationState::Active));
    }

    #[test]
    fn should_map_permission_denied_into_failure() {
        let err = HushbotError::PermissionDenied(PermissionDenied {
            capability: Capability::Location,
        });
        assert_eq!(
            RegistrationFailure::from(err),
            RegistrationFailure::PermissionDenied(Capability::Location)
        );
    }

    #[test]
    fn should_map_provider_error_into_failure() {
        let failure = RegistrationFailure::from(ProviderError::TooManyRegions);
        assert_eq!(
            failure,
            RegistrationFailure::Provider("too many regions registered".to_string())
        );
    }

    #[test]
    fn should_convert_failure_back_into_error() {
        let err: HushbotError =
            RegistrationFailure::PermissionDenied(Capability::Location).into();
        assert!(matches!(
            err,
            HushbotError::PermissionDenied(PermissionDenied {
                capability: Capability::Location
            })
        ));
    }

    #[test]
    fn should_serialize_error_state_with_reason() {
        let state = RegistrationState::Error(RegistrationFailure::Provider("boom".to_string()));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["reason"]["kind"], "provider");
        assert_eq!(json["reason"]["detail"], "boom");
    }
}
