//! Geofencing provider port: the OS primitive that monitors circular regions.
//!
//! Registration is asynchronous: the provider acknowledges `add_region` once
//! it has started monitoring, then reports crossings for that region through
//! the [`TransitionSink`] it was handed, until the region is removed.

use std::future::Future;

use hushbot_domain::error::HushbotError;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::id::GeofenceId;

use crate::transition_channel::TransitionSink;

pub trait GeofencingProvider {
    /// Start monitoring `geofence`, delivering crossings to `sink`.
    ///
    /// Adding a region whose id is already monitored replaces it.
    ///
    /// Fails with `PermissionDenied` when location is not granted.
    fn add_region(
        &self,
        geofence: Geofence,
        sink: TransitionSink,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send;

    /// Stop monitoring the region with this id.
    ///
    /// Fails with `ProviderError::RegionNotFound` when nothing is monitored
    /// under that id.
    fn remove_region(&self, id: GeofenceId)
    -> impl Future<Output = Result<(), HushbotError>> + Send;
}

impl<T: GeofencingProvider + Send + Sync> GeofencingProvider for std::sync::Arc<T> {
    fn add_region(
        &self,
        geofence: Geofence,
        sink: TransitionSink,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        (**self).add_region(geofence, sink)
    }

    fn remove_region(
        &self,
        id: GeofenceId,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        (**self).remove_region(id)
    }
}
