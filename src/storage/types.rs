use crate::subscription::{Subscription, SubscriptionState};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The subscription database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A subscription with this callback already exists
    #[error("A subscription with callback {0} already exists")]
    DuplicateCallback(String),

    /// No row with this id exists
    #[error("Subscription {0} does not exist")]
    NotFound(i64),

    /// A stored row holds a state string this build does not know
    #[error("Stored subscription {id} has unknown state {state:?}")]
    InvalidState { id: i64, state: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    /// Maps a unique-constraint violation on insert to `DuplicateCallback`.
    pub(crate) fn from_insert(err: sqlx::Error, callback: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::DuplicateCallback(callback.to_owned());
            }
        }

        Self::from_sqlx(err)
    }
}

/// SQLite lock-related error messages:
/// SQLITE_BUSY (5): database is locked
/// SQLITE_LOCKED (6): database table is locked
/// SQLITE_CANTOPEN (14): unable to open database file
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for subscription queries (used by sqlx FromRow)
/// Converts to Subscription via into_subscription(), parsing the state column
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubscriptionDbRow {
    pub id: i64,
    pub topic: String,
    pub hub: String,
    pub callback: String,
    pub state: String,
    pub lease_seconds: Option<i64>,
    pub expired_at: Option<i64>,
    pub last_successful_verification_at: Option<i64>,
    pub last_unsuccessful_verification_at: Option<i64>,
    pub last_received_content_at: Option<i64>,
}

impl SubscriptionDbRow {
    pub(crate) fn into_subscription(self) -> Result<Subscription, DatabaseError> {
        let state = self
            .state
            .parse::<SubscriptionState>()
            .map_err(|_| DatabaseError::InvalidState {
                id: self.id,
                state: self.state.clone(),
            })?;

        Ok(Subscription {
            id: self.id,
            topic: self.topic,
            hub: self.hub,
            callback: self.callback,
            state,
            lease_seconds: self.lease_seconds,
            expired_at: self.expired_at,
            last_successful_verification_at: self.last_successful_verification_at,
            last_unsuccessful_verification_at: self.last_unsuccessful_verification_at,
            last_received_content_at: self.last_received_content_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str) -> SubscriptionDbRow {
        SubscriptionDbRow {
            id: 7,
            topic: "https://example.org/feed".to_owned(),
            hub: "https://hub.example.com/".to_owned(),
            callback: "https://sub.example.net/callback/a".to_owned(),
            state: state.to_owned(),
            lease_seconds: Some(60),
            expired_at: None,
            last_successful_verification_at: None,
            last_unsuccessful_verification_at: None,
            last_received_content_at: None,
        }
    }

    #[test]
    fn test_row_converts_known_state() {
        let sub = row("subscribed").into_subscription().unwrap();
        assert_eq!(sub.id, 7);
        assert_eq!(sub.state, SubscriptionState::Subscribed);
        assert_eq!(sub.lease_seconds, Some(60));
    }

    #[test]
    fn test_row_with_unknown_state_is_an_error() {
        assert!(matches!(
            row("verified").into_subscription(),
            Err(DatabaseError::InvalidState { id: 7, .. })
        ));
    }

    #[test]
    fn test_lock_messages_detected() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("(code: 14) unable to open database file"));
        assert!(!is_lock_message("no such table: subscriptions"));
    }
}
