//! HTTP adapter: exposes the subscriber's operations as `axum` routes.

mod error;
mod handlers;

pub use error::ErrorResponse;

use crate::config::Config;
use crate::storage::SubscriptionStore;
use crate::subscriber::Subscriber;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the router. Routes are mounted under the subscriber's callback
/// prefix so callback URLs resolve back to the verify/notify handlers.
pub fn router<S: SubscriptionStore + 'static>(subscriber: Arc<Subscriber<S>>) -> Router {
    let prefix = subscriber.callbacks().prefix().to_owned();

    Router::new()
        .route(&format!("{prefix}/subscribe"), get(handlers::subscribe::<S>))
        .route(
            &format!("{prefix}/callback/:id"),
            get(handlers::verify::<S>).post(handlers::notify::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(subscriber)
}

/// Binds `config.listen_addr` and serves until Ctrl-C.
///
/// Notification bodies are capped at `config.max_body_bytes`.
pub async fn serve<S: SubscriptionStore + 'static>(
    config: &Config,
    subscriber: Subscriber<S>,
) -> std::io::Result<()> {
    let app = router(Arc::new(subscriber)).layer(DefaultBodyLimit::max(config.max_body_bytes));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        addr = %addr,
        host = %config.host,
        prefix = %config.path_prefix,
        "WebSub subscriber listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
}
