use super::Subscriber;
use crate::discovery::{extract_links, LinkPair, Resource};
use crate::error::WebSubError;
use crate::storage::{SubscriptionFilter, SubscriptionStore};
use crate::subscription::{Subscription, SubscriptionState};
use reqwest::header::HeaderMap;
use serde::Serialize;
use url::Url;

/// Authenticated content delivered by a hub, forwarded downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentNotification {
    pub subscription_id: i64,
    pub topic: String,
    pub hub: String,
    pub callback: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Unix seconds.
    pub received_at: i64,
}

impl<S: SubscriptionStore> Subscriber<S> {
    /// Authenticates a hub's content notification for `callback`.
    ///
    /// The notification must present topic/hub links (headers first, then
    /// body). It is accepted when the topic equals the subscription's topic
    /// exactly and the hub's host equals the subscription hub's host.
    /// Accepted content is stamped on the subscription and forwarded on the
    /// notification channel, if one is attached.
    ///
    /// # Errors
    ///
    /// - `Rejected` when links are missing or do not match, or the
    ///   subscription is unsubscribed
    /// - `SubscriptionNotFound` when no subscription uses `callback`
    /// - `Transport` when the store fails or the consumer has gone away
    pub async fn authenticate(
        &self,
        callback: &str,
        headers: &HeaderMap,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<ContentNotification, WebSubError> {
        let presented = match extract_links(&Resource {
            headers: Some(headers),
            content_type,
            body: &body,
            base_url: None,
        }) {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(callback = %callback, error = %e, "Notification without topic/hub links");
                return Err(WebSubError::Rejected(
                    "notification presents no topic/hub links".to_owned(),
                ));
            }
        };

        let Some(mut subscription) = self
            .store
            .first(&SubscriptionFilter::callback(callback))
            .await?
        else {
            tracing::warn!(callback = %callback, topic = %presented.topic, "Notification for unknown callback");
            return Err(WebSubError::SubscriptionNotFound);
        };

        if let Err(reason) = check_presented(&subscription, &presented) {
            tracing::warn!(
                callback = %callback,
                topic = %presented.topic,
                hub = %presented.hub,
                reason = %reason,
                "Notification rejected"
            );
            return Err(WebSubError::Rejected(reason));
        }

        let now = chrono::Utc::now().timestamp();
        subscription.last_received_content_at = Some(now);
        self.store.save(&subscription).await?;

        let notification = ContentNotification {
            subscription_id: subscription.id,
            topic: subscription.topic,
            hub: subscription.hub,
            callback: subscription.callback,
            content_type: content_type.map(str::to_owned),
            body,
            received_at: now,
        };

        tracing::info!(
            callback = %callback,
            topic = %notification.topic,
            bytes = notification.body.len(),
            "Notification accepted"
        );

        if let Some(sender) = &self.notifications {
            sender.send(notification.clone()).await.map_err(|_| {
                tracing::error!(callback = %callback, "Notification consumer has shut down");
                WebSubError::Transport("notification consumer has shut down".to_owned())
            })?;
        }

        Ok(notification)
    }
}

/// Exact topic match plus hub host match.
fn check_presented(subscription: &Subscription, presented: &LinkPair) -> Result<(), String> {
    if subscription.state == SubscriptionState::Unsubscribed {
        return Err("subscription is unsubscribed".to_owned());
    }

    if presented.topic != subscription.topic {
        return Err(format!(
            "topic {} does not match subscribed topic",
            presented.topic
        ));
    }

    let presented_host = host_of(&presented.hub);
    if presented_host.is_none() || presented_host != host_of(&subscription.hub) {
        return Err(format!(
            "hub {} does not match subscribed hub host",
            presented.hub
        ));
    }

    Ok(())
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::subscriber::tests::test_subscriber;
    use crate::subscription::{Mode, SubscriptionRequest, VerificationRequest};
    use pretty_assertions::assert_eq;
    use reqwest::header::{HeaderValue, LINK};
    use tokio::sync::mpsc;

    const TOPIC: &str = "https://example.org/feed";

    async fn subscribed(store: &MemoryStore) -> Subscription {
        let subscriber = test_subscriber(store.clone());
        let (subscription, _) = subscriber
            .prepare(SubscriptionRequest::SubscribeWithHub {
                topic: TOPIC.to_owned(),
                hub: "https://hub.example.com/".to_owned(),
                lease_seconds: None,
            })
            .await
            .unwrap();
        subscriber
            .verify(
                &subscription.callback,
                VerificationRequest {
                    mode: Mode::Subscribe,
                    topic: TOPIC.to_owned(),
                    challenge: "c".to_owned(),
                    lease_seconds: None,
                },
            )
            .await
            .unwrap();
        subscription
    }

    fn links(topic: &str, hub: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.append(
            LINK,
            HeaderValue::from_str(&format!("<{topic}>; rel=\"self\"")).unwrap(),
        );
        headers.append(
            LINK,
            HeaderValue::from_str(&format!("<{hub}>; rel=\"hub\"")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_matching_notification_forwarded() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let (tx, mut rx) = mpsc::channel(4);
        let subscriber = test_subscriber(store.clone()).with_notifications(tx);

        // Same host, different path: hub matching is host-only
        let accepted = subscriber
            .authenticate(
                &subscription.callback,
                &links(TOPIC, "https://hub.example.com/publish"),
                Some("application/atom+xml"),
                b"<feed/>".to_vec(),
            )
            .await
            .unwrap();

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded, accepted);
        assert_eq!(forwarded.subscription_id, subscription.id);
        assert_eq!(forwarded.body, b"<feed/>".to_vec());
        assert_eq!(forwarded.content_type.as_deref(), Some("application/atom+xml"));

        let row = store
            .first(&SubscriptionFilter::callback(subscription.callback.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.last_received_content_at, Some(accepted.received_at));
        assert_eq!(row.state, SubscriptionState::Subscribed);
    }

    #[tokio::test]
    async fn test_links_in_body_are_accepted() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let subscriber = test_subscriber(store);
        let body = format!(
            r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>T</title>
  <id>urn:t</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <link rel="self" href="{TOPIC}"/>
  <link rel="hub" href="https://hub.example.com/"/>
</feed>"#
        );

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &HeaderMap::new(),
                Some("application/atom+xml"),
                body.into_bytes(),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_topic_mismatch_rejected() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let subscriber = test_subscriber(store.clone());

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &links("https://example.org/feed?page=2", "https://hub.example.com/"),
                None,
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::Rejected(_))));
        let row = store
            .first(&SubscriptionFilter::callback(subscription.callback.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.last_received_content_at, None);
    }

    #[tokio::test]
    async fn test_hub_host_mismatch_rejected() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let subscriber = test_subscriber(store);

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &links(TOPIC, "https://evil.example.com/"),
                None,
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_missing_links_rejected() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let subscriber = test_subscriber(store);

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &HeaderMap::new(),
                Some("text/plain"),
                b"hello".to_vec(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unknown_callback() {
        let subscriber = test_subscriber(MemoryStore::new());

        let result = subscriber
            .authenticate(
                "https://sub.example.net/websub/callback/unknown",
                &links(TOPIC, "https://hub.example.com/"),
                None,
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::SubscriptionNotFound)));
    }

    #[tokio::test]
    async fn test_unsubscribed_rejects_notifications() {
        let store = MemoryStore::new();
        let mut subscription = subscribed(&store).await;
        subscription = store
            .first(&SubscriptionFilter::callback(subscription.callback.as_str()))
            .await
            .unwrap()
            .unwrap();
        subscription.state = SubscriptionState::Unsubscribed;
        store.save(&subscription).await.unwrap();
        let subscriber = test_subscriber(store);

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &links(TOPIC, "https://hub.example.com/"),
                None,
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_closed_consumer_is_transport_error() {
        let store = MemoryStore::new();
        let subscription = subscribed(&store).await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let subscriber = test_subscriber(store).with_notifications(tx);

        let result = subscriber
            .authenticate(
                &subscription.callback,
                &links(TOPIC, "https://hub.example.com/"),
                None,
                Vec::new(),
            )
            .await;

        assert!(matches!(result, Err(WebSubError::Transport(_))));
    }

    #[test]
    fn test_hub_host_comparison_ignores_case_and_path() {
        let subscription = Subscription {
            id: 1,
            topic: TOPIC.to_owned(),
            hub: "https://Hub.Example.com/".to_owned(),
            callback: "cb".to_owned(),
            state: SubscriptionState::Subscribed,
            lease_seconds: None,
            expired_at: None,
            last_successful_verification_at: None,
            last_unsuccessful_verification_at: None,
            last_received_content_at: None,
        };

        assert!(check_presented(
            &subscription,
            &LinkPair {
                topic: TOPIC.to_owned(),
                hub: "http://hub.example.com:8080/x".to_owned(),
            }
        )
        .is_ok());
        assert!(check_presented(
            &subscription,
            &LinkPair {
                topic: TOPIC.to_owned(),
                hub: "not a url".to_owned(),
            }
        )
        .is_err());
    }
}
