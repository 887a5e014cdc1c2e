use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Enumerations
// ============================================================================

/// Where a subscription stands in the hub handshake.
///
/// Stored as the snake_case name (`pending_subscription`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    PendingSubscription,
    Subscribed,
    PendingUnsubscription,
    /// Terminal.
    Unsubscribed,
}

impl SubscriptionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingSubscription => "pending_subscription",
            Self::Subscribed => "subscribed",
            Self::PendingUnsubscription => "pending_unsubscription",
            Self::Unsubscribed => "unsubscribed",
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingSubscription | Self::PendingUnsubscription
        )
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown subscription state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for SubscriptionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_subscription" => Ok(Self::PendingSubscription),
            "subscribed" => Ok(Self::Subscribed),
            "pending_unsubscription" => Ok(Self::PendingUnsubscription),
            "unsubscribed" => Ok(Self::Unsubscribed),
            other => Err(UnknownState(other.to_owned())),
        }
    }
}

/// `hub.mode` of a request or verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Subscribe,
    Unsubscribe,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }

    /// State a subscription enters while waiting for the hub to verify this mode.
    pub fn pending_state(self) -> SubscriptionState {
        match self {
            Self::Subscribe => SubscriptionState::PendingSubscription,
            Self::Unsubscribe => SubscriptionState::PendingUnsubscription,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown hub.mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscribe" => Ok(Self::Subscribe),
            "unsubscribe" => Ok(Self::Unsubscribe),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A stored subscription. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub topic: String,
    pub hub: String,
    /// Unique across all subscriptions.
    pub callback: String,
    pub state: SubscriptionState,
    pub lease_seconds: Option<i64>,
    pub expired_at: Option<i64>,
    pub last_successful_verification_at: Option<i64>,
    pub last_unsuccessful_verification_at: Option<i64>,
    pub last_received_content_at: Option<i64>,
}

/// Fields supplied when a subscription row is first created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub topic: String,
    pub hub: String,
    pub callback: String,
    pub state: SubscriptionState,
    pub lease_seconds: Option<i64>,
}
