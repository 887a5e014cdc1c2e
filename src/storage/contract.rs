//! Behaviour every `SubscriptionStore` implementation must share.
//! Each store's test module runs these against its own instance.

use super::{DatabaseError, SubscriptionFilter, SubscriptionStore};
use crate::subscription::{NewSubscription, SubscriptionState};
use pretty_assertions::assert_eq;

pub(crate) fn new_subscription(callback: &str) -> NewSubscription {
    NewSubscription {
        topic: "https://example.org/feed".to_owned(),
        hub: "https://hub.example.com/".to_owned(),
        callback: callback.to_owned(),
        state: SubscriptionState::PendingSubscription,
        lease_seconds: Some(3600),
    }
}

pub(crate) async fn create_and_find<S: SubscriptionStore>(store: &S) {
    let a = store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await
        .unwrap();
    let b = store
        .create(new_subscription("https://sub.example.net/callback/b"))
        .await
        .unwrap();

    assert!(a.id > 0);
    assert!(b.id > a.id);
    assert_eq!(a.state, SubscriptionState::PendingSubscription);
    assert_eq!(a.lease_seconds, Some(3600));
    assert_eq!(a.expired_at, None);

    let found = store
        .first(&SubscriptionFilter::callback("https://sub.example.net/callback/b"))
        .await
        .unwrap();
    assert_eq!(found, Some(b));

    let missing = store
        .first(&SubscriptionFilter::callback("https://sub.example.net/callback/zzz"))
        .await
        .unwrap();
    assert_eq!(missing, None);
}

pub(crate) async fn duplicate_callback_rejected<S: SubscriptionStore>(store: &S) {
    store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await
        .unwrap();

    let again = store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await;
    assert!(matches!(again, Err(DatabaseError::DuplicateCallback(_))));

    let all = store.list(&SubscriptionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

pub(crate) async fn save_updates_mutable_fields_only<S: SubscriptionStore>(store: &S) {
    let created = store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await
        .unwrap();

    let mut changed = created.clone();
    changed.topic = "https://elsewhere.example.org/".to_owned();
    changed.hub = "https://otherhub.example.com/".to_owned();
    changed.state = SubscriptionState::Subscribed;
    changed.lease_seconds = Some(86400);
    changed.expired_at = Some(1_700_086_400);
    changed.last_successful_verification_at = Some(1_700_000_000);
    changed.last_unsuccessful_verification_at = Some(1_699_999_000);
    changed.last_received_content_at = Some(1_700_000_500);
    store.save(&changed).await.unwrap();

    let stored = store
        .first(&SubscriptionFilter::callback("https://sub.example.net/callback/a"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored.topic, created.topic);
    assert_eq!(stored.hub, created.hub);
    assert_eq!(stored.state, SubscriptionState::Subscribed);
    assert_eq!(stored.lease_seconds, Some(86400));
    assert_eq!(stored.expired_at, Some(1_700_086_400));
    assert_eq!(stored.last_successful_verification_at, Some(1_700_000_000));
    assert_eq!(stored.last_unsuccessful_verification_at, Some(1_699_999_000));
    assert_eq!(stored.last_received_content_at, Some(1_700_000_500));
}

pub(crate) async fn save_missing_row_fails<S: SubscriptionStore>(store: &S) {
    let mut ghost = store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await
        .unwrap();
    ghost.id += 100;

    assert!(matches!(
        store.save(&ghost).await,
        Err(DatabaseError::NotFound(id)) if id == ghost.id
    ));
}

pub(crate) async fn filters_combine<S: SubscriptionStore>(store: &S) {
    let a = store
        .create(new_subscription("https://sub.example.net/callback/a"))
        .await
        .unwrap();
    let mut b = store
        .create(NewSubscription {
            topic: "https://example.org/other".to_owned(),
            ..new_subscription("https://sub.example.net/callback/b")
        })
        .await
        .unwrap();
    b.state = SubscriptionState::Subscribed;
    store.save(&b).await.unwrap();

    let by_topic = store
        .list(&SubscriptionFilter::default().with_topic("https://example.org/feed"))
        .await
        .unwrap();
    assert_eq!(by_topic, vec![a.clone()]);

    let by_state = store
        .list(&SubscriptionFilter::default().with_state(SubscriptionState::Subscribed))
        .await
        .unwrap();
    assert_eq!(by_state, vec![b.clone()]);

    let none = store
        .first(
            &SubscriptionFilter::callback("https://sub.example.net/callback/a")
                .with_topic("https://example.org/other"),
        )
        .await
        .unwrap();
    assert_eq!(none, None);

    let all = store.list(&SubscriptionFilter::default()).await.unwrap();
    assert_eq!(all, vec![a, b]);
}
