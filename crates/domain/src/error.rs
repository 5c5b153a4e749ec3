//! Common error types used across the workspace.
//!
//! Each concern has its own typed error; [`HushbotError`] aggregates them via
//! `#[from]` so that ports and services can propagate with `?`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level error returned by ports and application services.
#[derive(Debug, thiserror::Error)]
pub enum HushbotError {
    /// A geofence definition violated a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A required capability has not been granted.
    #[error("permission denied")]
    PermissionDenied(#[from] PermissionDenied),

    /// The geofencing provider failed for an internal reason.
    #[error("provider error")]
    Provider(#[from] ProviderError),

    /// The notification-policy store could not be reached.
    #[error("notification policy unavailable: {0}")]
    PolicyUnavailable(String),

    /// No position is known to the location provider.
    #[error("location unavailable")]
    LocationUnavailable,
}

/// Invariant violations on a geofence definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be blank")]
    EmptyName,

    #[error("name {0:?} does not contain any alphanumeric character")]
    InvalidName(String),

    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("radius {radius} m is below the minimum of {min} m")]
    RadiusTooSmall { radius: f64, min: f64 },

    #[error("{field} is not a valid number")]
    InvalidNumber { field: &'static str },
}

/// Lookup miss for a named item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Device capabilities the engine depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fine location, required to register geofences.
    Location,
    /// Write access to the interruption filter.
    NotificationPolicy,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Location => f.write_str("location"),
            Self::NotificationPolicy => f.write_str("notification_policy"),
        }
    }
}

/// A capability was required but not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{capability} capability not granted")]
pub struct PermissionDenied {
    pub capability: Capability,
}

/// Failures reported by the geofencing provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider has no region with the given id.
    #[error("region not found")]
    RegionNotFound,

    /// The provider cannot monitor regions right now (e.g. location is off).
    #[error("geofencing unavailable")]
    Unavailable,

    /// The provider refused to register any more regions.
    #[error("too many regions registered")]
    TooManyRegions,

    /// Any other provider-internal failure.
    #[error("provider failure: {0}")]
    Internal(String),
}
