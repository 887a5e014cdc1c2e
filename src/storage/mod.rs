//! Subscription persistence.
//!
//! [`SubscriptionStore`] is the seam the subscriber core depends on.
//! [`Database`] implements it over SQLite; [`MemoryStore`] keeps rows in
//! process memory.

#[cfg(test)]
pub(crate) mod contract;
mod memory;
mod schema;
mod subscriptions;
mod types;

pub use memory::MemoryStore;
pub use schema::Database;
pub use types::DatabaseError;

use crate::subscription::{NewSubscription, Subscription, SubscriptionState};
use std::future::Future;

/// Field filter for subscription lookups. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub callback: Option<String>,
    pub topic: Option<String>,
    pub state: Option<SubscriptionState>,
}

impl SubscriptionFilter {
    pub fn callback(callback: impl Into<String>) -> Self {
        Self {
            callback: Some(callback.into()),
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_state(mut self, state: SubscriptionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.callback
            .as_deref()
            .map_or(true, |c| c == subscription.callback)
            && self.topic.as_deref().map_or(true, |t| t == subscription.topic)
            && self.state.map_or(true, |s| s == subscription.state)
    }
}

/// Create/find/update over subscription records.
///
/// `save` writes the mutable fields only (state, lease and timestamps);
/// topic, hub and callback are fixed at creation.
pub trait SubscriptionStore: Send + Sync {
    /// Inserts a row and returns it with its assigned id.
    ///
    /// Fails with [`DatabaseError::DuplicateCallback`] if the callback exists.
    fn create(
        &self,
        new: NewSubscription,
    ) -> impl Future<Output = Result<Subscription, DatabaseError>> + Send;

    /// The lowest-id subscription matching `filter`.
    fn first(
        &self,
        filter: &SubscriptionFilter,
    ) -> impl Future<Output = Result<Option<Subscription>, DatabaseError>> + Send;

    /// Every subscription matching `filter`, ordered by id.
    fn list(
        &self,
        filter: &SubscriptionFilter,
    ) -> impl Future<Output = Result<Vec<Subscription>, DatabaseError>> + Send;

    fn save(
        &self,
        subscription: &Subscription,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;
}
