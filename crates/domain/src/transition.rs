//! Transitions: boundary crossings reported for a geofence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::id::GeofenceId;

/// Direction of a boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Enter,
    Exit,
}

impl TransitionKind {
    /// DND state requested by this kind of transition.
    #[must_use]
    pub fn desired_dnd(self) -> bool {
        matches!(self, Self::Enter)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// Which crossings a geofence reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMask {
    Enter,
    Exit,
    #[default]
    Both,
}

impl TransitionMask {
    /// Whether `kind` passes this mask.
    #[must_use]
    pub fn includes(self, kind: TransitionKind) -> bool {
        match self {
            Self::Both => true,
            Self::Enter => kind == TransitionKind::Enter,
            Self::Exit => kind == TransitionKind::Exit,
        }
    }
}

/// Where a transition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    /// The geofencing provider.
    Provider,
    /// The mock location harness.
    Mock,
}

/// A single boundary crossing, consumed once by the transition processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub geofence_id: GeofenceId,
    pub kind: TransitionKind,
    pub observed_at: Timestamp,
    pub source: TransitionSource,
}

impl TransitionEvent {
    /// A transition reported by the geofencing provider.
    #[must_use]
    pub fn from_provider(
        geofence_id: GeofenceId,
        kind: TransitionKind,
        observed_at: Timestamp,
    ) -> Self {
        Self {
            geofence_id,
            kind,
            observed_at,
            source: TransitionSource::Provider,
        }
    }

    /// A transition synthesized by the mock harness.
    #[must_use]
    pub fn from_mock(
        geofence_id: GeofenceId,
        kind: TransitionKind,
        observed_at: Timestamp,
    ) -> Self {
        Self {
            geofence_id,
            kind,
            observed_at,
            source: TransitionSource::Mock,
        }
    }
}
