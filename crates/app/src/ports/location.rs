//! Location provider port: last known device position.
//!
//! Only used to pre-fill the center of a new geofence; it plays no part in
//! the automation path.

use std::future::Future;

use hushbot_domain::error::HushbotError;
use hushbot_domain::geo::Coordinates;

pub trait LocationProvider {
    /// The most recent fix, or `None` when the provider has none.
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Coordinates>, HushbotError>> + Send;
}

impl<T: LocationProvider + Send + Sync> LocationProvider for std::sync::Arc<T> {
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Coordinates>, HushbotError>> + Send {
        (**self).last_known_position()
    }
}
