use crate::discovery::DiscoveryError;
use crate::hub::HubError;
use crate::storage::DatabaseError;
use reqwest::StatusCode;
use thiserror::Error;

/// Boundary error for every subscriber operation.
///
/// Module errors ([`DiscoveryError`], [`HubError`], [`DatabaseError`]) fold
/// into this taxonomy; [`WebSubError::status`] maps it onto the HTTP status
/// returned to hubs and callers.
#[derive(Debug, Error)]
pub enum WebSubError {
    /// The topic advertised no topic/hub pair, could not be fetched, or its URL was rejected
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),
    /// A required parameter was missing or malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// No subscription exists for the callback
    #[error("subscription not found")]
    SubscriptionNotFound,
    /// The request does not fit the subscription's current state
    #[error("state mismatch: {0}")]
    StateMismatch(String),
    /// A content notification failed authentication
    #[error("notification rejected: {0}")]
    Rejected(String),
    /// HTTP client or persistence failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl WebSubError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DiscoveryFailed(_)
            | Self::SubscriptionNotFound
            | Self::StateMismatch(_)
            | Self::Rejected(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DiscoveryError> for WebSubError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::NoLinks
            | DiscoveryError::InvalidUrl(_)
            | DiscoveryError::HttpStatus(_) => Self::DiscoveryFailed(e.to_string()),
            DiscoveryError::Network(_)
            | DiscoveryError::Timeout
            | DiscoveryError::TooLarge => Self::Transport(e.to_string()),
        }
    }
}

impl From<HubError> for WebSubError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::InvalidUrl(_) => Self::InvalidRequest(e.to_string()),
            HubError::Network(_) | HubError::Timeout => Self::Transport(e.to_string()),
        }
    }
}

impl From<DatabaseError> for WebSubError {
    fn from(e: DatabaseError) -> Self {
        Self::Transport(e.to_string())
    }
}
