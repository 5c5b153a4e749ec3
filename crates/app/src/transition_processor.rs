//! Transition processor: turns boundary crossings into DND writes.
//!
//! The processor owns the [`PolicyState`]; nothing else writes it. For each
//! transition it:
//!
//! 1. drops it (as an anomaly) when the geofence is unknown or not active,
//! 2. ignores it when the mock harness overrides the provider, or when the
//!    geofence's mask excludes the crossing,
//! 3. flags it as out of order when it was observed before the newest
//!    accepted transition, but still applies it,
//! 4. writes the desired DND state only if it differs from the current one.
//!
//! Write failures are reported and remembered; nothing is retried, the next
//! transition simply tries again.

use hushbot_domain::anomaly::Anomaly;
use hushbot_domain::clock::Timestamp;
use hushbot_domain::geofence::Geofence;
use hushbot_domain::policy::{PolicyFailure, PolicyState};
use hushbot_domain::registration::RegistrationState;
use hushbot_domain::transition::{TransitionEvent, TransitionSource};

use crate::policy_adapter::PolicyControllerAdapter;
use crate::ports::NotificationPolicyController;

/// Why a transition was accepted but not acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The geofence does not react to this kind of crossing.
    MaskExcluded,
    /// The mock harness is the only transition source while enabled.
    MockOverride,
}

/// What processing a transition led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The policy was written.
    Applied { dnd_enabled: bool },
    /// The policy already had the desired value; nothing was written.
    Unchanged,
    Ignored(IgnoreReason),
    Dropped(Anomaly),
    /// The write was refused; the policy state is untouched.
    Failed(PolicyFailure),
}

/// What the processor needs to know about the event's geofence.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub geofence: Option<&'a Geofence>,
    pub registration: &'a RegistrationState,
    pub mock_override: bool,
}

/// Result of [`TransitionProcessor::process`].
#[derive(Debug)]
pub struct Processed {
    pub outcome: TransitionOutcome,
    /// Irregularities noticed on the way, including non-fatal ones that did
    /// not prevent the write.
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Default)]
pub struct TransitionProcessor {
    policy: PolicyState,
    last_failure: Option<PolicyFailure>,
    newest_observed_at: Option<Timestamp>,
}

impl TransitionProcessor {
    /// Start from the DND state read off the device.
    #[must_use]
    pub fn new(dnd_enabled: bool) -> Self {
        Self {
            policy: PolicyState::initial(dnd_enabled),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    #[must_use]
    pub fn last_failure(&self) -> Option<&PolicyFailure> {
        self.last_failure.as_ref()
    }

    /// Process one transition. `now` stamps a successful write.
    pub async fn process<P: NotificationPolicyController>(
        &mut self,
        event: &TransitionEvent,
        ctx: TransitionContext<'_>,
        policy: &PolicyControllerAdapter<P>,
        now: Timestamp,
    ) -> Processed {
        let geofence_id = &event.geofence_id;

        let Some(geofence) = ctx.geofence else {
            return Self::dropped(Anomaly::UnknownGeofence {
                geofence_id: geofence_id.clone(),
            });
        };
        if !ctx.registration.is_active() {
            return Self::dropped(Anomaly::InactiveGeofence {
                geofence_id: geofence_id.clone(),
                state: ctx.registration.clone(),
            });
        }
        if ctx.mock_override && event.source == TransitionSource::Provider {
            return Self::ignored(IgnoreReason::MockOverride);
        }
        if !geofence.transition_mask.includes(event.kind) {
            return Self::ignored(IgnoreReason::MaskExcluded);
        }

        let mut anomalies = Vec::new();
        match self.newest_observed_at {
            Some(newest) if event.observed_at < newest => {
                anomalies.push(Anomaly::OutOfOrder {
                    geofence_id: geofence_id.clone(),
                    observed_at: event.observed_at,
                    newest_observed_at: newest,
                });
            }
            _ => self.newest_observed_at = Some(event.observed_at),
        }

        let desired = event.kind.desired_dnd();
        if desired == self.policy.dnd_enabled {
            tracing::debug!(%geofence_id, dnd_enabled = desired, "policy already in desired state");
            return Processed {
                outcome: TransitionOutcome::Unchanged,
                anomalies,
            };
        }

        let outcome = match policy.set_dnd_state(desired).await {
            Ok(()) => {
                self.policy.record_write(desired, geofence_id.clone(), now);
                self.last_failure = None;
                tracing::info!(%geofence_id, kind = %event.kind, dnd_enabled = desired, "policy applied");
                TransitionOutcome::Applied {
                    dnd_enabled: desired,
                }
            }
            Err(err) => {
                let failure = PolicyFailure::from(&err);
                tracing::warn!(%err, %geofence_id, dnd_enabled = desired, "policy write failed");
                self.last_failure = Some(failure.clone());
                TransitionOutcome::Failed(failure)
            }
        };

        Processed { outcome, anomalies }
    }

    fn dropped(anomaly: Anomaly) -> Processed {
        Processed {
            outcome: TransitionOutcome::Dropped(anomaly.clone()),
            anomalies: vec![anomaly],
        }
    }

    fn ignored(reason: IgnoreReason) -> Processed {
        tracing::debug!(?reason, "transition ignored");
        Processed {
            outcome: TransitionOutcome::Ignored(reason),
            anomalies: Vec::new(),
        }
    }
}
