//! # hushbot-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `GeofencingProvider`: register and remove monitored regions
//!   - `LocationProvider`: last known position, for pre-filling drafts
//!   - `NotificationPolicyController`: read and write the DND filter
//!   - `EventPublisher`: broadcast engine events
//! - Define the **driving/inbound port**: `AutomationEngine`, which accepts
//!   geofence edits, mock positions and provider signals, and answers
//!   snapshot queries
//! - Provide **in-process infrastructure** (event bus, transition channel)
//!   that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hushbot-domain` only (plus `tokio::sync` for channels and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod event_bus;
pub mod mock_harness;
pub mod policy_adapter;
pub mod ports;
pub mod provider_adapter;
pub mod registry;
pub mod transition_channel;
pub mod transition_processor;

#[cfg(test)]
mod test_support;
