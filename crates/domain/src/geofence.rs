//! Geofence: a named circular region and the crossings it reacts to.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::Coordinates;
use crate::id::GeofenceId;
use crate::transition::TransitionMask;

/// Smallest accepted radius, in meters (inclusive).
pub const MIN_RADIUS_METERS: f64 = 20.0;

/// Radius pre-filled in a new draft, in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 50.0;

/// A user-defined circular region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: GeofenceId,
    pub name: String,
    pub center: Coordinates,
    pub radius_meters: f64,
    pub transition_mask: TransitionMask,
}

impl Geofence {
    /// Create a builder for constructing a [`Geofence`].
    #[must_use]
    pub fn builder() -> GeofenceBuilder {
        GeofenceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the name is blank, a coordinate is
    /// out of range, or the radius is below [`MIN_RADIUS_METERS`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        self.center.validate()?;
        if self.radius_meters.is_nan()
            || self.radius_meters.is_infinite()
            || self.radius_meters < MIN_RADIUS_METERS
        {
            return Err(ValidationError::RadiusTooSmall {
                radius: self.radius_meters,
                min: MIN_RADIUS_METERS,
            });
        }
        Ok(())
    }

    /// Whether `point` lies within the circle. The boundary counts as inside.
    #[must_use]
    pub fn contains(&self, point: &Coordinates) -> bool {
        self.center.distance_to(point) <= self.radius_meters
    }
}

/// Step-by-step builder for [`Geofence`].
///
/// The id defaults to [`GeofenceId::from_name`] of the name.
#[derive(Debug, Default)]
pub struct GeofenceBuilder {
    id: Option<GeofenceId>,
    name: Option<String>,
    center: Option<Coordinates>,
    radius_meters: Option<f64>,
    transition_mask: TransitionMask,
}

impl GeofenceBuilder {
    #[must_use]
    pub fn id(mut self, id: GeofenceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn center(mut self, latitude: f64, longitude: f64) -> Self {
        self.center = Some(Coordinates {
            latitude,
            longitude,
        });
        self
    }

    #[must_use]
    pub fn radius_meters(mut self, radius_meters: f64) -> Self {
        self.radius_meters = Some(radius_meters);
        self
    }

    #[must_use]
    pub fn transition_mask(mut self, mask: TransitionMask) -> Self {
        self.transition_mask = mask;
        self
    }

    /// Consume the builder, validate, and return a [`Geofence`].
    ///
    /// A missing center defaults to `(0, 0)` and a missing radius to
    /// [`DEFAULT_RADIUS_METERS`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the name is missing or any invariant
    /// fails.
    pub fn build(self) -> Result<Geofence, ValidationError> {
        let name = self.name.unwrap_or_default();
        let id = match self.id {
            Some(id) => id,
            None => GeofenceId::from_name(&name)?,
        };
        let geofence = Geofence {
            id,
            name,
            center: self.center.unwrap_or(Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            }),
            radius_meters: self.radius_meters.unwrap_or(DEFAULT_RADIUS_METERS),
            transition_mask: self.transition_mask,
        };
        geofence.validate()?;
        Ok(geofence)
    }
}

/// Raw form input for a geofence, as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceDraft {
    /// The stored geofence this draft edits; `None` for a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing: Option<GeofenceId>,
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    pub radius: String,
    pub transition_mask: TransitionMask,
}

impl Default for GeofenceDraft {
    fn default() -> Self {
        Self {
            editing: None,
            name: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            radius: format!("{DEFAULT_RADIUS_METERS}"),
            transition_mask: TransitionMask::Both,
        }
    }
}

impl GeofenceDraft {
    /// An empty draft centered on `position`, when known.
    #[must_use]
    pub fn centered_at(position: Option<Coordinates>) -> Self {
        let mut draft = Self::default();
        if let Some(position) = position {
            draft.latitude = position.latitude.to_string();
            draft.longitude = position.longitude.to_string();
        }
        draft
    }

    /// A draft pre-filled from an existing geofence, for editing.
    #[must_use]
    pub fn from_geofence(geofence: &Geofence) -> Self {
        Self {
            editing: Some(geofence.id.clone()),
            name: geofence.name.clone(),
            latitude: geofence.center.latitude.to_string(),
            longitude: geofence.center.longitude.to_string(),
            radius: geofence.radius_meters.to_string(),
            transition_mask: geofence.transition_mask,
        }
    }

    /// Parse the text fields and build a validated [`Geofence`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidNumber`] when a numeric field does
    /// not parse, or any error from [`GeofenceBuilder::build`].
    pub fn parse(&self) -> Result<Geofence, ValidationError> {
        let latitude = parse_number(&self.latitude, "latitude")?;
        let longitude = parse_number(&self.longitude, "longitude")?;
        let radius = parse_number(&self.radius, "radius")?;

        Geofence::builder()
            .name(self.name.trim())
            .center(latitude, longitude)
            .radius_meters(radius)
            .transition_mask(self.transition_mask)
            .build()
    }
}

fn parse_number(raw: &str, field: &'static str) -> Result<f64, ValidationError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidNumber { field })
}
