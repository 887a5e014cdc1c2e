use super::Subscriber;
use crate::error::WebSubError;
use crate::storage::{SubscriptionFilter, SubscriptionStore};
use crate::subscription::{state, VerificationRequest};

impl<S: SubscriptionStore> Subscriber<S> {
    /// Answers a hub's verification-of-intent for `callback`.
    ///
    /// Returns the challenge to echo (verbatim) when the attempt's mode fits
    /// the subscription's state and its topic matches exactly. The outcome is
    /// persisted either way.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` when no subscription uses `callback`
    /// - `StateMismatch` when mode or topic do not match
    /// - `Transport` when the store fails
    pub async fn verify(
        &self,
        callback: &str,
        request: VerificationRequest,
    ) -> Result<String, WebSubError> {
        let Some(mut subscription) = self
            .store
            .first(&SubscriptionFilter::callback(callback))
            .await?
        else {
            tracing::warn!(
                callback = %callback,
                topic = %request.topic,
                mode = %request.mode,
                "Verification for unknown callback"
            );
            return Err(WebSubError::SubscriptionNotFound);
        };

        let now = chrono::Utc::now().timestamp();
        let outcome = state::apply_verification(&mut subscription, &request, now);
        self.store.save(&subscription).await?;

        match outcome {
            Ok(new_state) => {
                tracing::info!(
                    callback = %callback,
                    topic = %request.topic,
                    mode = %request.mode,
                    state = %new_state,
                    lease_seconds = ?subscription.lease_seconds,
                    "Verification accepted"
                );
                Ok(request.challenge)
            }
            Err(mismatch) => {
                tracing::warn!(
                    callback = %callback,
                    topic = %request.topic,
                    mode = %request.mode,
                    error = %mismatch,
                    "Verification rejected"
                );
                Err(WebSubError::StateMismatch(mismatch.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::WebSubError;
    use crate::storage::{MemoryStore, SubscriptionFilter, SubscriptionStore};
    use crate::subscriber::tests::test_subscriber;
    use crate::subscription::{
        Mode, Subscription, SubscriptionRequest, SubscriptionState, VerificationRequest,
    };
    use pretty_assertions::assert_eq;

    async fn pending(store: &MemoryStore) -> Subscription {
        let (subscription, _) = test_subscriber(store.clone())
            .prepare(SubscriptionRequest::SubscribeWithHub {
                topic: "https://example.org/feed".to_owned(),
                hub: "https://hub.example.com/".to_owned(),
                lease_seconds: None,
            })
            .await
            .unwrap();
        subscription
    }

    async fn stored(store: &MemoryStore, callback: &str) -> Subscription {
        store
            .first(&SubscriptionFilter::callback(callback))
            .await
            .unwrap()
            .unwrap()
    }

    fn attempt(mode: Mode, topic: &str, lease_seconds: Option<i64>) -> VerificationRequest {
        VerificationRequest {
            mode,
            topic: topic.to_owned(),
            challenge: "abc123".to_owned(),
            lease_seconds,
        }
    }

    #[tokio::test]
    async fn test_verify_subscribe_echoes_challenge() {
        let store = MemoryStore::new();
        let subscription = pending(&store).await;
        let subscriber = test_subscriber(store.clone());

        let before = chrono::Utc::now().timestamp();
        let challenge = subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Subscribe, "https://example.org/feed", Some(86400)),
            )
            .await
            .unwrap();

        assert_eq!(challenge, "abc123");
        let row = stored(&store, &subscription.callback).await;
        assert_eq!(row.state, SubscriptionState::Subscribed);
        assert_eq!(row.lease_seconds, Some(86400));
        let verified_at = row.last_successful_verification_at.unwrap();
        assert!(verified_at >= before);
        assert_eq!(row.expired_at, Some(verified_at + 86400));
    }

    #[tokio::test]
    async fn test_verify_unknown_callback() {
        let subscriber = test_subscriber(MemoryStore::new());

        let result = subscriber
            .verify(
                "https://sub.example.net/websub/callback/nope",
                attempt(Mode::Subscribe, "https://example.org/feed", None),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::SubscriptionNotFound)));
    }

    #[tokio::test]
    async fn test_verify_topic_mismatch_persists_failure() {
        let store = MemoryStore::new();
        let subscription = pending(&store).await;
        let subscriber = test_subscriber(store.clone());

        let result = subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Subscribe, "https://example.org/elsewhere", None),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::StateMismatch(_))));
        let row = stored(&store, &subscription.callback).await;
        assert_eq!(row.state, SubscriptionState::PendingSubscription);
        assert!(row.last_unsuccessful_verification_at.is_some());
        assert_eq!(row.last_successful_verification_at, None);
    }

    #[tokio::test]
    async fn test_verify_wrong_mode_persists_failure() {
        let store = MemoryStore::new();
        let subscription = pending(&store).await;
        let subscriber = test_subscriber(store.clone());

        let result = subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Unsubscribe, "https://example.org/feed", None),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::StateMismatch(_))));
        let row = stored(&store, &subscription.callback).await;
        assert_eq!(row.state, SubscriptionState::PendingSubscription);
        assert!(row.last_unsuccessful_verification_at.is_some());
    }

    #[tokio::test]
    async fn test_repeated_verification_is_idempotent() {
        let store = MemoryStore::new();
        let subscription = pending(&store).await;
        let subscriber = test_subscriber(store.clone());
        let verify = attempt(Mode::Subscribe, "https://example.org/feed", Some(60));

        subscriber
            .verify(&subscription.callback, verify.clone())
            .await
            .unwrap();
        let again = subscriber
            .verify(&subscription.callback, verify)
            .await
            .unwrap();

        assert_eq!(again, "abc123");
        let row = stored(&store, &subscription.callback).await;
        assert_eq!(row.state, SubscriptionState::Subscribed);
        assert_eq!(row.lease_seconds, Some(60));
    }

    #[tokio::test]
    async fn test_full_unsubscribe_handshake() {
        let store = MemoryStore::new();
        let subscription = pending(&store).await;
        let subscriber = test_subscriber(store.clone());

        subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Subscribe, "https://example.org/feed", None),
            )
            .await
            .unwrap();
        subscriber
            .prepare(SubscriptionRequest::Unsubscribe {
                topic: "https://example.org/feed".to_owned(),
                callback: subscription.callback.clone(),
            })
            .await
            .unwrap();
        subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Unsubscribe, "https://example.org/feed", None),
            )
            .await
            .unwrap();

        let row = stored(&store, &subscription.callback).await;
        assert_eq!(row.state, SubscriptionState::Unsubscribed);

        // Terminal: a late subscribe verification is refused
        let late = subscriber
            .verify(
                &subscription.callback,
                attempt(Mode::Subscribe, "https://example.org/feed", None),
            )
            .await;
        assert!(matches!(late, Err(WebSubError::StateMismatch(_))));
    }
}
