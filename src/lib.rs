//! WebSub subscriber.
//!
//! Discovers a topic's hub, sends subscribe/unsubscribe requests, answers the
//! hub's verification of intent and authenticates content notifications
//! before forwarding them downstream.
//!
//! ```no_run
//! use std::sync::Arc;
//! use websub_subscriber::{CallbackUrls, Database, Discoverer, Subscriber};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Database::open("subscriptions.db").await?;
//! let subscriber = Subscriber::new(
//!     store,
//!     Discoverer::new(reqwest::Client::new()),
//!     CallbackUrls::new("https://sub.example.net", "/websub"),
//! );
//! let app = websub_subscriber::server::router(Arc::new(subscriber));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod hub;
pub mod server;
pub mod storage;
pub mod subscriber;
pub mod subscription;
pub mod util;

pub use config::Config;
pub use discovery::{extract_links, Discoverer, DiscoveryError, LinkPair, Resource};
pub use error::WebSubError;
pub use hub::{HubError, HubReply, HubRequest};
pub use storage::{Database, DatabaseError, MemoryStore, SubscriptionFilter, SubscriptionStore};
pub use subscriber::{CallbackUrls, ContentNotification, HubOutcome, Subscriber};
pub use subscription::{
    Mode, Subscription, SubscriptionRequest, SubscriptionState, VerificationRequest,
};
