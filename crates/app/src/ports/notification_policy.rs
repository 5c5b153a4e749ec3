//! Notification-policy port: the OS interruption filter.

use std::future::Future;

use hushbot_domain::error::HushbotError;

/// Read/write access to the device-wide "do not disturb" filter.
pub trait NotificationPolicyController {
    /// Whether the app has been granted write access to the filter.
    fn has_write_capability(&self) -> impl Future<Output = bool> + Send;

    /// Whether the interruption filter is currently suppressing interruptions.
    fn interruption_filter_enabled(&self) -> impl Future<Output = Result<bool, HushbotError>> + Send;

    /// Turn interruption suppression on or off.
    fn set_interruption_filter(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send;
}

impl<T: NotificationPolicyController + Send + Sync> NotificationPolicyController
    for std::sync::Arc<T>
{
    fn has_write_capability(&self) -> impl Future<Output = bool> + Send {
        (**self).has_write_capability()
    }

    fn interruption_filter_enabled(&self) -> impl Future<Output = Result<bool, HushbotError>> + Send {
        (**self).interruption_filter_enabled()
    }

    fn set_interruption_filter(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), HushbotError>> + Send {
        (**self).set_interruption_filter(enabled)
    }
}
