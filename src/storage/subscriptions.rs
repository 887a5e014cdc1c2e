use sqlx::{QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::{DatabaseError, SubscriptionDbRow};
use super::{SubscriptionFilter, SubscriptionStore};
use crate::subscription::{NewSubscription, Subscription};

const SUBSCRIPTION_COLUMNS: &str = "id, topic, hub, callback, state, lease_seconds, expired_at, \
     last_successful_verification_at, last_unsuccessful_verification_at, last_received_content_at";

/// Builds `SELECT ... WHERE <filter> ORDER BY id`.
fn select_matching(filter: &SubscriptionFilter) -> QueryBuilder<'static, Sqlite> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE 1 = 1"));

    if let Some(callback) = &filter.callback {
        builder.push(" AND callback = ").push_bind(callback.clone());
    }
    if let Some(topic) = &filter.topic {
        builder.push(" AND topic = ").push_bind(topic.clone());
    }
    if let Some(state) = filter.state {
        builder.push(" AND state = ").push_bind(state.as_str());
    }

    builder.push(" ORDER BY id");
    builder
}

impl SubscriptionStore for Database {
    // ========================================================================
    // Subscription Operations
    // ========================================================================

    async fn create(&self, new: NewSubscription) -> Result<Subscription, DatabaseError> {
        let row: SubscriptionDbRow = sqlx::query_as(&format!(
            "INSERT INTO subscriptions (topic, hub, callback, state, lease_seconds) \
             VALUES (?, ?, ?, ?, ?) RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(&new.topic)
        .bind(&new.hub)
        .bind(&new.callback)
        .bind(new.state.as_str())
        .bind(new.lease_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, &new.callback))?;

        row.into_subscription()
    }

    async fn first(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Option<Subscription>, DatabaseError> {
        let mut builder = select_matching(filter);
        builder.push(" LIMIT 1");

        let row: Option<SubscriptionDbRow> = builder
            .build_query_as::<SubscriptionDbRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        row.map(SubscriptionDbRow::into_subscription).transpose()
    }

    async fn list(&self, filter: &SubscriptionFilter) -> Result<Vec<Subscription>, DatabaseError> {
        let rows: Vec<SubscriptionDbRow> = select_matching(filter)
            .build_query_as::<SubscriptionDbRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter()
            .map(SubscriptionDbRow::into_subscription)
            .collect()
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                state = ?,
                lease_seconds = ?,
                expired_at = ?,
                last_successful_verification_at = ?,
                last_unsuccessful_verification_at = ?,
                last_received_content_at = ?
            WHERE id = ?
        "#,
        )
        .bind(subscription.state.as_str())
        .bind(subscription.lease_seconds)
        .bind(subscription.expired_at)
        .bind(subscription.last_successful_verification_at)
        .bind(subscription.last_unsuccessful_verification_at)
        .bind(subscription.last_received_content_at)
        .bind(subscription.id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(subscription.id));
        }

        Ok(())
    }
}
