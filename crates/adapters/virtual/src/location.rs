//! Virtual location provider: a last known fix set by hand.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use hushbot_app::ports::LocationProvider;
use hushbot_domain::error::HushbotError;
use hushbot_domain::geo::Coordinates;

/// Reports whatever position was last set, or none.
#[derive(Default)]
pub struct VirtualLocationProvider {
    position: Mutex<Option<Coordinates>>,
}

impl VirtualLocationProvider {
    #[must_use]
    pub fn at(position: Coordinates) -> Self {
        Self {
            position: Mutex::new(Some(position)),
        }
    }

    pub fn set_position(&self, position: Option<Coordinates>) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    fn position(&self) -> Option<Coordinates> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocationProvider for VirtualLocationProvider {
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Coordinates>, HushbotError>> + Send {
        let position = self.position();
        async move { Ok(position) }
    }
}
