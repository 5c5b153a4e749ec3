//! Policy controller adapter: guards writes to the interruption filter.

use hushbot_domain::error::{Capability, HushbotError, PermissionDenied};

use crate::ports::NotificationPolicyController;

/// Wraps a [`NotificationPolicyController`] so that writes are refused up
/// front when the capability is missing.
pub struct PolicyControllerAdapter<P> {
    controller: P,
}

impl<P: NotificationPolicyController> PolicyControllerAdapter<P> {
    pub fn new(controller: P) -> Self {
        Self { controller }
    }

    /// Whether DND may be written. Safe to call before prompting the user.
    pub async fn has_capability(&self) -> bool {
        self.controller.has_write_capability().await
    }

    /// Current DND state as reported by the device.
    ///
    /// # Errors
    ///
    /// Propagates controller failures (`PolicyUnavailable`).
    pub async fn current_dnd_state(&self) -> Result<bool, HushbotError> {
        self.controller.interruption_filter_enabled().await
    }

    /// Write the DND state.
    ///
    /// # Errors
    ///
    /// Returns [`HushbotError::PermissionDenied`] without touching the
    /// controller when the capability is missing, or propagates controller
    /// failures.
    pub async fn set_dnd_state(&self, enabled: bool) -> Result<(), HushbotError> {
        if !self.has_capability().await {
            return Err(PermissionDenied {
                capability: Capability::NotificationPolicy,
            }
            .into());
        }
        self.controller.set_interruption_filter(enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePolicy;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn should_write_when_capability_granted() {
        let fake = Arc::new(FakePolicy::default());
        let adapter = PolicyControllerAdapter::new(Arc::clone(&fake));

        adapter.set_dnd_state(true).await.unwrap();

        assert!(fake.dnd());
        assert_eq!(fake.writes(), 1);
        assert!(adapter.current_dnd_state().await.unwrap());
    }

    #[tokio::test]
    async fn should_refuse_write_without_capability() {
        let fake = Arc::new(FakePolicy::default());
        fake.granted.store(false, Ordering::SeqCst);
        let adapter = PolicyControllerAdapter::new(Arc::clone(&fake));

        let result = adapter.set_dnd_state(true).await;

        assert!(matches!(
            result,
            Err(HushbotError::PermissionDenied(PermissionDenied {
                capability: Capability::NotificationPolicy
            }))
        ));
        assert_eq!(fake.writes(), 0);
        assert!(!fake.dnd());
    }

    #[tokio::test]
    async fn should_report_capability_independently_of_writes() {
        let fake = Arc::new(FakePolicy::default());
        let adapter = PolicyControllerAdapter::new(Arc::clone(&fake));
        assert!(adapter.has_capability().await);

        fake.granted.store(false, Ordering::SeqCst);
        assert!(!adapter.has_capability().await);
        assert_eq!(fake.writes(), 0);
    }

    #[tokio::test]
    async fn should_propagate_unavailable_store() {
        let fake = Arc::new(FakePolicy::default());
        fake.unavailable.store(true, Ordering::SeqCst);
        let adapter = PolicyControllerAdapter::new(Arc::clone(&fake));

        let result = adapter.set_dnd_state(true).await;
        assert!(matches!(result, Err(HushbotError::PolicyUnavailable(_))));
    }
}
