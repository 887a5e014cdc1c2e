use std::sync::Arc;
use tokio::sync::Mutex;

use super::types::DatabaseError;
use super::{SubscriptionFilter, SubscriptionStore};
use crate::subscription::{NewSubscription, Subscription};

/// In-process subscription store.
///
/// Clones share the same rows. Ids start at 1 and increase monotonically.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryRows>>,
}

#[derive(Debug, Default)]
struct MemoryRows {
    last_id: i64,
    rows: Vec<Subscription>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for MemoryStore {
    async fn create(&self, new: NewSubscription) -> Result<Subscription, DatabaseError> {
        let mut inner = self.inner.lock().await;

        if inner.rows.iter().any(|row| row.callback == new.callback) {
            return Err(DatabaseError::DuplicateCallback(new.callback));
        }

        inner.last_id += 1;
        let subscription = Subscription {
            id: inner.last_id,
            topic: new.topic,
            hub: new.hub,
            callback: new.callback,
            state: new.state,
            lease_seconds: new.lease_seconds,
            expired_at: None,
            last_successful_verification_at: None,
            last_unsuccessful_verification_at: None,
            last_received_content_at: None,
        };
        inner.rows.push(subscription.clone());

        Ok(subscription)
    }

    async fn first(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Option<Subscription>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|row| filter.matches(row)).cloned())
    }

    async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .rows
            .iter_mut()
            .find(|row| row.id == subscription.id)
            .ok_or(DatabaseError::NotFound(subscription.id))?;

        row.state = subscription.state;
        row.lease_seconds = subscription.lease_seconds;
        row.expired_at = subscription.expired_at;
        row.last_successful_verification_at = subscription.last_successful_verification_at;
        row.last_unsuccessful_verification_at = subscription.last_unsuccessful_verification_at;
        row.last_received_content_at = subscription.last_received_content_at;

        Ok(())
    }
}
