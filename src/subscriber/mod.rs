//! The subscriber: turns subscription intents into hub requests, answers hub
//! verification challenges and authenticates content notifications.

mod notify;
mod verify;

pub use notify::ContentNotification;

use crate::discovery::Discoverer;
use crate::error::WebSubError;
use crate::hub::{HubReply, HubRequest};
use crate::storage::{SubscriptionFilter, SubscriptionStore};
use crate::subscription::{state, Mode, NewSubscription, Subscription, SubscriptionRequest};
use crate::util::{validate_url, UrlValidationError};
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// Callback URLs
// ============================================================================

/// Public base of the callback endpoints, fixed at startup.
///
/// Callbacks look like `{host}{prefix}/callback/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    host: String,
    prefix: String,
}

impl CallbackUrls {
    /// `host` is scheme plus authority (`https://sub.example.net`); `prefix`
    /// is the mount path of the routes (`/websub`, or empty).
    pub fn new(host: &str, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            host: host.trim_end_matches('/').to_owned(),
            prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("/{prefix}")
            },
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Normalized route prefix: empty or `/segment[/segment...]`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn for_id(&self, id: &str) -> String {
        format!("{}{}/callback/{}", self.host, self.prefix, id)
    }

    /// A fresh, unguessable callback URL.
    pub fn generate(&self) -> String {
        self.for_id(&Uuid::new_v4().to_string())
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// Result of sending a subscription request to a hub.
#[derive(Debug, Clone)]
pub struct HubOutcome {
    pub subscription: Subscription,
    pub request: HubRequest,
    pub reply: HubReply,
}

pub struct Subscriber<S> {
    store: S,
    discoverer: Discoverer,
    callbacks: CallbackUrls,
    notifications: Option<mpsc::Sender<ContentNotification>>,
}

impl<S: SubscriptionStore> Subscriber<S> {
    pub fn new(store: S, discoverer: Discoverer, callbacks: CallbackUrls) -> Self {
        Self {
            store,
            discoverer,
            callbacks,
            notifications: None,
        }
    }

    /// Forwards every authenticated notification to `sender`.
    pub fn with_notifications(mut self, sender: mpsc::Sender<ContentNotification>) -> Self {
        self.notifications = Some(sender);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn callbacks(&self) -> &CallbackUrls {
        &self.callbacks
    }

    /// Records the intent and returns the subscription plus the mode to send
    /// to its hub. Does not contact the hub.
    ///
    /// # Errors
    ///
    /// - `DiscoveryFailed` when the topic advertises no hub
    /// - `InvalidRequest` when an explicit hub URL is unusable
    /// - `SubscriptionNotFound` when an unsubscribe names a callback bound to
    ///   another topic
    /// - `StateMismatch` when unsubscribing an already unsubscribed callback
    /// - `Transport` on network or storage failure
    pub async fn prepare(
        &self,
        request: SubscriptionRequest,
    ) -> Result<(Subscription, Mode), WebSubError> {
        let mode = request.mode();
        let topic = request.topic().to_owned();

        let result = match request {
            SubscriptionRequest::SubscribeWithDiscovery {
                topic,
                lease_seconds,
            } => self.subscribe_with_discovery(topic, lease_seconds).await,
            SubscriptionRequest::SubscribeWithHub {
                topic,
                hub,
                lease_seconds,
            } => self.subscribe_with_hub(topic, hub, lease_seconds).await,
            SubscriptionRequest::Unsubscribe { topic, callback } => {
                self.prepare_unsubscribe(topic, callback).await
            }
        };

        match result {
            Ok(subscription) => Ok((subscription, mode)),
            Err(e) => {
                tracing::warn!(topic = %topic, mode = %mode, error = %e, "Subscription request failed");
                Err(e)
            }
        }
    }

    /// [`prepare`](Self::prepare)s the request, then sends it to the hub.
    ///
    /// A hub that does not answer 202 is not an error: its status and body
    /// come back in [`HubOutcome::reply`]. The subscription stays pending
    /// either way.
    pub async fn subscribe(&self, request: SubscriptionRequest) -> Result<HubOutcome, WebSubError> {
        let (subscription, mode) = self.prepare(request).await?;
        let hub_request = HubRequest::new(&subscription, mode);

        let reply = hub_request
            .send(self.discoverer.client(), self.discoverer.timeout())
            .await
            .map_err(|e| {
                tracing::warn!(
                    callback = %subscription.callback,
                    topic = %subscription.topic,
                    mode = %mode,
                    error = %e,
                    "Hub request failed"
                );
                WebSubError::from(e)
            })?;

        Ok(HubOutcome {
            subscription,
            request: hub_request,
            reply,
        })
    }

    async fn subscribe_with_discovery(
        &self,
        topic: String,
        lease_seconds: Option<i64>,
    ) -> Result<Subscription, WebSubError> {
        let links = self.discoverer.discover(&topic).await?;
        self.check_hub(&links.hub).map_err(|e| {
            WebSubError::DiscoveryFailed(format!("advertised hub {}: {e}", links.hub))
        })?;
        tracing::info!(topic = %links.topic, hub = %links.hub, "Hub advertised by topic");

        self.create(NewSubscription {
            topic: links.topic,
            hub: links.hub,
            callback: self.callbacks.generate(),
            state: Mode::Subscribe.pending_state(),
            lease_seconds,
        })
        .await
    }

    async fn subscribe_with_hub(
        &self,
        topic: String,
        hub: String,
        lease_seconds: Option<i64>,
    ) -> Result<Subscription, WebSubError> {
        self.check_hub(&hub)
            .map_err(|e| WebSubError::InvalidRequest(format!("hub {hub}: {e}")))?;
        tracing::info!(topic = %topic, hub = %hub, "Using requested hub");

        self.create(NewSubscription {
            topic,
            hub,
            callback: self.callbacks.generate(),
            state: Mode::Subscribe.pending_state(),
            lease_seconds,
        })
        .await
    }

    async fn prepare_unsubscribe(
        &self,
        topic: String,
        callback: String,
    ) -> Result<Subscription, WebSubError> {
        let existing = self
            .store
            .first(&SubscriptionFilter::callback(callback.as_str()))
            .await?;

        let Some(mut subscription) = existing else {
            let links = self.discoverer.discover(&topic).await?;
            self.check_hub(&links.hub).map_err(|e| {
                WebSubError::DiscoveryFailed(format!("advertised hub {}: {e}", links.hub))
            })?;
            tracing::info!(
                callback = %callback,
                topic = %links.topic,
                hub = %links.hub,
                "Unsubscribing unknown callback through advertised hub"
            );
            return self
                .create(NewSubscription {
                    topic: links.topic,
                    hub: links.hub,
                    callback,
                    state: Mode::Unsubscribe.pending_state(),
                    lease_seconds: None,
                })
                .await;
        };

        if subscription.topic != topic {
            return Err(WebSubError::SubscriptionNotFound);
        }
        // Stored hubs are rechecked against the current policy
        self.check_hub(&subscription.hub).map_err(|e| {
            WebSubError::InvalidRequest(format!("hub {}: {e}", subscription.hub))
        })?;

        let target = state::unsubscribe_request_target(subscription.state).ok_or_else(|| {
            WebSubError::StateMismatch(format!(
                "callback is already {}",
                subscription.state
            ))
        })?;

        subscription.state = target;
        self.store.save(&subscription).await?;
        Ok(subscription)
    }

    /// Every hub is held to the same network policy as topic fetches,
    /// whether requested, advertised or already stored.
    fn check_hub(&self, hub: &str) -> Result<(), UrlValidationError> {
        validate_url(hub, self.discoverer.network_policy()).map(|_| ())
    }

    async fn create(&self, new: NewSubscription) -> Result<Subscription, WebSubError> {
        let subscription = self.store.create(new).await?;
        tracing::info!(
            id = subscription.id,
            callback = %subscription.callback,
            topic = %subscription.topic,
            state = %subscription.state,
            "Subscription stored"
        );
        Ok(subscription)
    }
}
