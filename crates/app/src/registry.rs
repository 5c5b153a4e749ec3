//! Geofence registry: the canonical, in-memory list of user-defined geofences.
//!
//! Entries keep insertion order. The registry is not synchronised itself; the
//! engine keeps it behind the same lock as the transition processor so edits
//! and transition handling never interleave.

use hushbot_domain::error::{HushbotError, NotFoundError, ValidationError};
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;

#[derive(Debug, Default)]
pub struct GeofenceRegistry {
    entries: Vec<Geofence>,
}

impl GeofenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a geofence, or replace the entry with the same id.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the definition breaks an invariant;
    /// the registry is left untouched.
    pub fn add(&mut self, geofence: Geofence) -> Result<GeofenceId, ValidationError> {
        geofence.validate()?;
        let id = geofence.id.clone();
        match self.position(&id) {
            Some(index) => self.entries[index] = geofence,
            None => self.entries.push(geofence),
        }
        Ok(id)
    }

    /// Replace the definition stored under `id`.
    ///
    /// The stored id is kept even if the new name would derive another one.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::Validation`] for an invalid definition and
    /// [`HushbotError::NotFound`] when `id` is unknown.
    pub fn update(&mut self, id: &GeofenceId, mut geofence: Geofence) -> Result<(), HushbotError> {
        geofence.id = id.clone();
        geofence.validate()?;
        let index = self.position(id).ok_or_else(|| NotFoundError {
            entity: "Geofence",
            id: id.to_string(),
        })?;
        self.entries[index] = geofence;
        Ok(())
    }

    /// Remove the entry with `id`. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &GeofenceId) -> Option<Geofence> {
        self.position(id).map(|index| self.entries.remove(index))
    }

    /// All geofences in insertion order.
    #[must_use]
    pub fn list(&self) -> &[Geofence] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: &GeofenceId) -> Option<&Geofence> {
        self.entries.iter().find(|g| &g.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &GeofenceId) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: &GeofenceId) -> Option<usize> {
        self.entries.iter().position(|g| &g.id == id)
    }
}
