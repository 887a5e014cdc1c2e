//! Route handlers.
//!
//! - `GET {prefix}/subscribe`: subscribe or unsubscribe through a hub
//! - `GET {prefix}/callback/:id`: hub verification of intent
//! - `POST {prefix}/callback/:id`: hub content notification

use super::error::empty;
use crate::error::WebSubError;
use crate::hub::HubReply;
use crate::storage::SubscriptionStore;
use crate::subscriber::Subscriber;
use crate::subscription::{SubscriptionRequest, VerificationRequest};
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

pub(crate) async fn subscribe<S: SubscriptionStore>(
    State(subscriber): State<Arc<Subscriber<S>>>,
    RawQuery(query): RawQuery,
) -> Result<Response, WebSubError> {
    let request = SubscriptionRequest::from_query(query.as_deref().unwrap_or_default())?;
    let outcome = subscriber.subscribe(request).await?;

    Ok(match outcome.reply {
        HubReply::Accepted => {
            let sent: serde_json::Map<String, serde_json::Value> = outcome
                .request
                .form_fields()
                .into_iter()
                .map(|(key, value)| (key.to_owned(), serde_json::Value::String(value)))
                .collect();
            (StatusCode::OK, Json(sent)).into_response()
        }
        HubReply::Rejected { status, body } => (status, body).into_response(),
    })
}

pub(crate) async fn verify<S: SubscriptionStore>(
    State(subscriber): State<Arc<Subscriber<S>>>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let callback = subscriber.callbacks().for_id(&id);

    let request = match VerificationRequest::from_query(query.as_deref().unwrap_or_default()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(callback = %callback, error = %e, "Malformed verification request");
            return empty(&e);
        }
    };

    match subscriber.verify(&callback, request).await {
        Ok(challenge) => (StatusCode::ACCEPTED, challenge).into_response(),
        Err(e) => empty(&e),
    }
}

pub(crate) async fn notify<S: SubscriptionStore>(
    State(subscriber): State<Arc<Subscriber<S>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let callback = subscriber.callbacks().for_id(&id);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match subscriber
        .authenticate(&callback, &headers, content_type.as_deref(), body.to_vec())
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        // Unauthenticated payloads are dropped without detail
        Err(e) => empty(&e),
    }
}
