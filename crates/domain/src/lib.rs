//! # hushbot-domain
//!
//! Pure domain model for the hushbot geofence-to-DND automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps and clocks
//! - Define **Geofences** (named circles with a transition mask) and their drafts
//! - Define **Transitions** (enter/exit crossings) and **Registration** states
//! - Define **Policy** state (the device-wide do-not-disturb flag)
//! - Define **Anomalies** and **Events** (records of what the engine did)
//! - Contain all invariant enforcement and geometry
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod clock;
pub mod error;
pub mod geo;
pub mod id;

pub mod anomaly;
pub mod event;
pub mod geofence;
pub mod policy;
pub mod registration;
pub mod transition;
