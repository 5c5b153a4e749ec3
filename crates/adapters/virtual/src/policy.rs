//! Virtual notification policy: an in-memory interruption filter.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hushbot_app::ports::NotificationPolicyController;
use hushbot_domain::error::HushbotError;

struct FilterState {
    granted: bool,
    available: bool,
    enabled: bool,
    writes: usize,
}

/// A simulated DND filter with a revocable write capability.
///
/// The controller itself does not check the capability on writes; that is
/// left to the caller, as on real devices where a write without access
/// throws.
pub struct VirtualPolicyController {
    state: Mutex<FilterState>,
}

impl Default for VirtualPolicyController {
    fn default() -> Self {
        Self {
            state: Mutex::new(FilterState {
                granted: true,
                available: true,
                enabled: false,
                writes: 0,
            }),
        }
    }
}

impl VirtualPolicyController {
    pub fn grant(&self) {
        self.lock_state().granted = true;
    }

    pub fn revoke(&self) {
        self.lock_state().granted = false;
    }

    /// Simulate the policy store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.lock_state().available = available;
    }

    /// Flip the filter from outside, as the user would from quick settings.
    pub fn set_enabled_externally(&self, enabled: bool) {
        self.lock_state().enabled = enabled;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock_state().writes
    }

    fn read(&self) -> Result<bool, HushbotError> {
        let state = self.lock_state();
        if state.available {
            Ok(state.enabled)
        } else {
            Err(unavailable())
        }
    }

    fn write(&self, enabled: bool) -> Result<(), HushbotError> {
        let mut state = self.lock_state();
        if !state.available {
            return Err(unavailable());
        }
        state.enabled = enabled;
        state.writes += 1;
        tracing::debug!(enabled, writes = state.writes, "virtual interruption filter written");
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, FilterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationPolicyController for VirtualPolicyController {
    fn has_write_capability(&self) -> impl Future<Output = bool> + Send {
        let granted = self.lock_state().granted;
        async move { granted }
    }

    fn interruption_filter_enabled(
        &self,
    ) -> impl Future<Output = Result<bool, HushbotError>> + Send {
        let result = self.read();
        async { result }
    }

    fn set_interruption_filter(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        let result = self.write(enabled);
        async { result }
    }
}

fn unavailable() -> HushbotError {
    HushbotError::PolicyUnavailable("virtual policy store offline".to_string())
}
