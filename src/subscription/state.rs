//! The subscription state machine.
//!
//! ```text
//! (none)                 --subscribe request----------> PendingSubscription
//! PendingSubscription    --verify(subscribe)----------> Subscribed
//! Subscribed             --verify(subscribe)----------> Subscribed
//! any but Unsubscribed   --unsubscribe request--------> PendingUnsubscription
//! (none)                 --unsubscribe request--------> PendingUnsubscription
//! PendingUnsubscription  --verify(unsubscribe)--------> Unsubscribed
//! Unsubscribed           --verify(unsubscribe)--------> Unsubscribed
//! ```
//!
//! Verification additionally requires the presented topic to equal the
//! stored topic exactly.

use super::{Mode, Subscription, SubscriptionState, VerificationRequest};
use thiserror::Error;

/// Why a verification attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationMismatch {
    #[error("hub.mode={mode} does not apply to a subscription in state {state}")]
    Mode {
        state: SubscriptionState,
        mode: Mode,
    },
    #[error("hub.topic {presented} does not match subscribed topic {expected}")]
    Topic { expected: String, presented: String },
}

/// Target state of a verification attempt in `mode`, if the transition exists.
pub fn verification_target(current: SubscriptionState, mode: Mode) -> Option<SubscriptionState> {
    use SubscriptionState::*;

    match (current, mode) {
        (PendingSubscription | Subscribed, Mode::Subscribe) => Some(Subscribed),
        (PendingUnsubscription | Unsubscribed, Mode::Unsubscribe) => Some(Unsubscribed),
        _ => None,
    }
}

/// Target state of an unsubscribe request against an existing row.
pub fn unsubscribe_request_target(current: SubscriptionState) -> Option<SubscriptionState> {
    match current {
        SubscriptionState::Unsubscribed => None,
        _ => Some(SubscriptionState::PendingUnsubscription),
    }
}

/// Applies a verification attempt to `subscription` at unix time `now`.
///
/// On success the state advances and `last_successful_verification_at` is
/// stamped; a subscribe attempt carrying a lease also sets `lease_seconds`
/// and `expired_at = now + lease`. On failure only
/// `last_unsuccessful_verification_at` changes.
///
/// Either way the caller persists the subscription afterwards.
pub fn apply_verification(
    subscription: &mut Subscription,
    attempt: &VerificationRequest,
    now: i64,
) -> Result<SubscriptionState, VerificationMismatch> {
    let checked = match verification_target(subscription.state, attempt.mode) {
        None => Err(VerificationMismatch::Mode {
            state: subscription.state,
            mode: attempt.mode,
        }),
        Some(_) if subscription.topic != attempt.topic => Err(VerificationMismatch::Topic {
            expected: subscription.topic.clone(),
            presented: attempt.topic.clone(),
        }),
        Some(target) => Ok(target),
    };

    let target = match checked {
        Ok(target) => target,
        Err(mismatch) => {
            subscription.last_unsuccessful_verification_at = Some(now);
            return Err(mismatch);
        }
    };

    subscription.state = target;
    subscription.last_successful_verification_at = Some(now);

    if attempt.mode == Mode::Subscribe {
        if let Some(lease) = attempt.lease_seconds {
            subscription.lease_seconds = Some(lease);
            subscription.expired_at = Some(now.saturating_add(lease));
        }
    }

    Ok(target)
}
